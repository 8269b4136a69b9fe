use crate::error::Result;
use crate::loader::LoadOptions;
use crate::service::SpecService;
use crate::types::version::SpecVersion;
use crate::types::{ParsedSpec, SecurityScheme, ServerVariable, TagInfo};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Deserialize)]
pub struct NoParams {}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerSummary {
    pub url: String,
    /// `url` with variables replaced by their defaults.
    pub resolved_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub variables: IndexMap<String, ServerVariable>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecSummary {
    pub title: String,
    pub description: String,
    pub version: String,
    pub spec_version: SpecVersion,
    pub source: String,
    pub loaded_at: DateTime<Utc>,
    pub servers: Vec<ServerSummary>,
    pub tags: Vec<TagInfo>,
    pub security_schemes: Vec<SecurityScheme>,
    pub endpoint_count: usize,
    pub schema_count: usize,
}

impl From<&ParsedSpec> for SpecSummary {
    fn from(spec: &ParsedSpec) -> Self {
        SpecSummary {
            title: spec.info.title.clone(),
            description: spec.info.description.clone(),
            version: spec.info.version.clone(),
            spec_version: spec.spec_version,
            source: spec.source.clone(),
            loaded_at: spec.loaded_at,
            servers: spec
                .servers
                .iter()
                .map(|server| ServerSummary {
                    url: server.url.clone(),
                    resolved_url: server.resolved_url(),
                    description: server.description.clone(),
                    variables: server.variables.clone(),
                })
                .collect(),
            tags: spec.tags.clone(),
            security_schemes: spec.security_schemes.clone(),
            endpoint_count: spec.endpoints.len(),
            schema_count: spec.schemas.len(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub cleared: bool,
}

pub fn load_spec(service: &SpecService, params: LoadOptions) -> Result<SpecSummary> {
    let spec = service.load(&params)?;
    Ok(SpecSummary::from(spec.as_ref()))
}

pub fn get_spec_info(service: &SpecService, _params: NoParams) -> Result<SpecSummary> {
    let spec = service.current()?;
    Ok(SpecSummary::from(spec.as_ref()))
}

pub fn clear_spec(service: &SpecService, _params: NoParams) -> Result<ClearResponse> {
    Ok(ClearResponse {
        cleared: service.clear(),
    })
}
