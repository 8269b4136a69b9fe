use crate::cache::SpecCache;
use crate::config::ExplorerConfig;
use crate::error::{Result, SpecError};
use crate::loader::{DefaultLoader, LoadOptions, SpecLoader};
use crate::normalizer::normalize;
use crate::sample::{SampleGenerator, SampleOptions};
use crate::types::schema::JsonSchema;
use crate::types::{
    Endpoint, HttpMethod, MediaType, ParsedSpec, ResponseDefinition, normalize_path,
};
use crate::validator::{PayloadValidator, ValidationReport};
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// The single cache slot the active spec is kept under.
const ACTIVE_SPEC_KEY: &str = "active-spec";

/// Body schema chosen for a request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestSchema {
    pub schema: JsonSchema,
    pub content_type: String,
    pub required: bool,
    pub description: String,
}

/// Body schema chosen for a response, with the response key that matched.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseSchema {
    pub schema: JsonSchema,
    pub content_type: String,
    pub status_code: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EndpointFilter {
    pub tag: Option<String>,
    pub method: Option<String>,
    pub deprecated: Option<bool>,
    /// Case-insensitive text matched against path, summary, description, operationId and tags.
    pub search: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl EndpointFilter {
    fn matches(&self, endpoint: &Endpoint) -> bool {
        if let Some(tag) = &self.tag {
            if !endpoint.tags.iter().any(|t| t.eq_ignore_ascii_case(tag)) {
                return false;
            }
        }
        if let Some(method) = &self.method {
            if !endpoint.method.as_str().eq_ignore_ascii_case(method) {
                return false;
            }
        }
        if let Some(deprecated) = self.deprecated {
            if endpoint.deprecated != deprecated {
                return false;
            }
        }
        if let Some(search) = &self.search {
            let needle = search.to_lowercase();
            let haystacks = [
                Some(endpoint.path.as_str()),
                Some(endpoint.summary.as_str()),
                Some(endpoint.description.as_str()),
                endpoint.operation_id.as_deref(),
            ];
            let found = haystacks
                .into_iter()
                .flatten()
                .chain(endpoint.tags.iter().map(String::as_str))
                .any(|text| text.to_lowercase().contains(&needle));
            if !found {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointSummary {
    pub path: String,
    pub method: HttpMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    pub summary: String,
    pub tags: Vec<String>,
    pub deprecated: bool,
}

impl From<&Endpoint> for EndpointSummary {
    fn from(endpoint: &Endpoint) -> Self {
        EndpointSummary {
            path: endpoint.path.clone(),
            method: endpoint.method,
            operation_id: endpoint.operation_id.clone(),
            summary: endpoint.summary.clone(),
            tags: endpoint.tags.clone(),
            deprecated: endpoint.deprecated,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointPage {
    pub endpoints: Vec<EndpointSummary>,
    /// Matches after filtering, before `offset`/`limit` are applied.
    pub total_count: usize,
    pub offset: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

/// Picks `preferred` when offered, else the first declared content type.
pub fn select_content_type<'c>(
    content: &'c IndexMap<String, MediaType>,
    preferred: &str,
) -> Option<(&'c String, &'c MediaType)> {
    content
        .get_key_value(preferred)
        .or_else(|| content.first())
}

/// Whether a response key such as `2XX` matches `status` digit by digit.
fn wildcard_matches(pattern: &str, status: &str) -> bool {
    pattern.len() == status.len()
        && pattern.chars().any(|c| c.eq_ignore_ascii_case(&'x'))
        && pattern
            .chars()
            .zip(status.chars())
            .all(|(p, s)| p == s || (p.eq_ignore_ascii_case(&'x') && s.is_ascii_digit()))
}

/// Exact key, then the first wildcard key in declaration order, then `default`.
pub fn resolve_response<'e>(
    endpoint: &'e Endpoint,
    status: &str,
) -> Option<(&'e String, &'e ResponseDefinition)> {
    endpoint
        .responses
        .get_key_value(status)
        .or_else(|| {
            endpoint
                .responses
                .iter()
                .find(|(pattern, _)| wildcard_matches(pattern, status))
        })
        .or_else(|| endpoint.responses.get_key_value("default"))
}

/// Status used when the caller names none: the first success entry, else the first entry.
fn default_status(endpoint: &Endpoint) -> Option<&str> {
    endpoint
        .responses
        .keys()
        .find(|status| status.starts_with('2'))
        .or_else(|| endpoint.responses.keys().next())
        .map(String::as_str)
}

/// Owns the active spec and everything derived from it.
pub struct SpecService {
    active: RwLock<Option<Arc<ParsedSpec>>>,
    cache: SpecCache,
    validator: PayloadValidator,
    loader: Box<dyn SpecLoader>,
    load_guard: Mutex<()>,
    config: ExplorerConfig,
}

impl Default for SpecService {
    fn default() -> Self {
        SpecService::new(ExplorerConfig::default())
    }
}

impl SpecService {
    pub fn new(config: ExplorerConfig) -> Self {
        SpecService::with_loader(config, DefaultLoader::new())
    }

    pub fn with_loader(config: ExplorerConfig, loader: impl SpecLoader + 'static) -> Self {
        SpecService {
            active: RwLock::new(None),
            cache: SpecCache::with_default_ttl(config.cache_ttl),
            validator: PayloadValidator::new(),
            loader: Box::new(loader),
            load_guard: Mutex::new(()),
            config,
        }
    }

    pub fn config(&self) -> &ExplorerConfig {
        &self.config
    }

    /// Loads, normalizes and activates a spec. A cached spec from the same source is reused.
    pub fn load(&self, options: &LoadOptions) -> Result<Arc<ParsedSpec>> {
        let source = options.source()?;
        let source_id = source.id();
        let _loading = self.load_guard.lock();

        let cache_key = ACTIVE_SPEC_KEY.to_string();
        if let Some(cached) = self.cache.get(&cache_key) {
            if cached.source == source_id {
                log::debug!("Reusing cached specification from {}", source_id);
                *self.active.write() = Some(Arc::clone(&cached));
                return Ok(cached);
            }
        }

        log::info!("Loading specification from {}", source_id);
        let loaded = self.loader.load(&source)?;
        let spec = Arc::new(normalize(&loaded.document, &loaded.source)?);
        self.cache.set(cache_key, Arc::clone(&spec), Some(self.config.cache_ttl));
        self.validator.clear();
        *self.active.write() = Some(Arc::clone(&spec));
        Ok(spec)
    }

    pub fn current(&self) -> Result<Arc<ParsedSpec>> {
        self.active.read().clone().ok_or(SpecError::SpecNotLoaded)
    }

    pub fn is_loaded(&self) -> bool {
        self.active.read().is_some()
    }

    /// Drops the active spec and its cache entry. Returns whether a spec was active.
    pub fn clear(&self) -> bool {
        let _loading = self.load_guard.lock();
        let previous = self.active.write().take();
        self.cache.invalidate(&ACTIVE_SPEC_KEY.to_string());
        self.validator.clear();
        previous.is_some()
    }

    pub fn get_endpoint(&self, path: &str, method: &str) -> Result<Endpoint> {
        let spec = self.current()?;
        spec.endpoint(path, method).cloned().ok_or_else(|| {
            SpecError::endpoint_not_found(normalize_path(path), method.to_ascii_lowercase())
        })
    }

    pub fn list_endpoints(&self, filter: &EndpointFilter) -> Result<EndpointPage> {
        let spec = self.current()?;
        let mut matched: Vec<&Endpoint> = spec
            .endpoints
            .values()
            .filter(|endpoint| filter.matches(endpoint))
            .collect();
        matched.sort_by(|a, b| {
            a.path
                .cmp(&b.path)
                .then_with(|| a.method.as_str().cmp(b.method.as_str()))
        });
        let total_count = matched.len();
        let offset = filter.offset.unwrap_or(0);
        let endpoints = matched
            .into_iter()
            .skip(offset)
            .take(filter.limit.unwrap_or(usize::MAX))
            .map(EndpointSummary::from)
            .collect();
        Ok(EndpointPage {
            endpoints,
            total_count,
            offset,
            limit: filter.limit,
        })
    }

    /// `None` when the endpoint declares no request body.
    pub fn get_request_schema(
        &self,
        path: &str,
        method: &str,
        preferred_content_type: Option<&str>,
    ) -> Result<Option<RequestSchema>> {
        let endpoint = self.get_endpoint(path, method)?;
        let Some(body) = &endpoint.request_body else {
            return Ok(None);
        };
        let preferred = preferred_content_type.unwrap_or(&self.config.default_content_type);
        Ok(
            select_content_type(&body.content, preferred).map(|(content_type, media)| {
                RequestSchema {
                    schema: media.schema.clone().unwrap_or_default(),
                    content_type: content_type.clone(),
                    required: body.required,
                    description: body.description.clone(),
                }
            }),
        )
    }

    /// `None` when no response entry resolves or the resolved entry has no content.
    pub fn get_response_schema(
        &self,
        path: &str,
        method: &str,
        status_code: Option<&str>,
        preferred_content_type: Option<&str>,
    ) -> Result<Option<ResponseSchema>> {
        let endpoint = self.get_endpoint(path, method)?;
        let Some(status) = status_code.or_else(|| default_status(&endpoint)) else {
            return Ok(None);
        };
        let Some((status_key, response)) = resolve_response(&endpoint, status) else {
            return Ok(None);
        };
        let preferred = preferred_content_type.unwrap_or(&self.config.default_content_type);
        Ok(
            select_content_type(&response.content, preferred).map(|(content_type, media)| {
                ResponseSchema {
                    schema: media.schema.clone().unwrap_or_default(),
                    content_type: content_type.clone(),
                    status_code: status_key.clone(),
                    description: response.description.clone(),
                }
            }),
        )
    }

    pub fn get_schema(&self, name: &str) -> Result<JsonSchema> {
        let spec = self.current()?;
        spec.schemas
            .get(name)
            .cloned()
            .ok_or_else(|| SpecError::schema_not_found(name))
    }

    pub fn schema_names(&self) -> Result<Vec<String>> {
        Ok(self.current()?.schemas.keys().cloned().collect())
    }

    pub fn validate(&self, payload: &Value, schema: &JsonSchema) -> Result<ValidationReport> {
        let draft = self.current()?.spec_version.draft();
        self.validator.validate(payload, schema, draft)
    }

    /// Request body schema, failing with `NoRequestBody` when the endpoint has none.
    pub fn require_request_schema(
        &self,
        path: &str,
        method: &str,
        preferred_content_type: Option<&str>,
    ) -> Result<RequestSchema> {
        self.get_request_schema(path, method, preferred_content_type)?
            .ok_or_else(|| SpecError::no_request_body(path, method))
    }

    /// Response body schema, failing with `InvalidInput` when nothing resolves.
    pub fn require_response_schema(
        &self,
        path: &str,
        method: &str,
        status_code: Option<&str>,
        preferred_content_type: Option<&str>,
    ) -> Result<ResponseSchema> {
        self.get_response_schema(path, method, status_code, preferred_content_type)?
            .ok_or_else(|| {
                SpecError::invalid_input(format!(
                    "No response body is defined for {} {} with status {}",
                    method.to_uppercase(),
                    path,
                    status_code.unwrap_or("(any)")
                ))
            })
    }

    /// Sample generator for the configured options, with per-call overrides applied.
    pub fn sample_generator(&self, overrides: Option<SampleOptions>) -> SampleGenerator {
        SampleGenerator::new(overrides.unwrap_or_else(|| self.config.sample.clone()))
    }
}
