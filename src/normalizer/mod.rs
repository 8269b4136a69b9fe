//! Builds the normalized [`ParsedSpec`] from a dereferenced 2.0 or 3.x document.
//!
//! The raw document is first parsed into a [`RawDocument`] variant; everything after that
//! point runs dialect-specific extraction over the matched variant. Helpers shared by both
//! dialects (operation walking, parameter merging, response filtering, security
//! requirements) live here.

pub mod openapi3;
pub mod swagger2;

use crate::error::{Result, SpecError};
use crate::types::schema::JsonSchema;
use crate::types::{
    ApiKeyLocation, Endpoint, HttpMethod, OAuthFlow, Parameter, ParameterLocation, ParsedSpec,
    ResponseDefinition, SecurityRequirement, SecuritySchemeKind, SpecInfo, TagInfo,
};
use crate::{
    DESCRIPTION_FIELD, EXAMPLE_FIELD, IN_FIELD, NAME_FIELD, OPENAPI_FIELD, PARAMETERS_FIELD,
    REQUIRED_FIELD, RESPONSES_FIELD, SECURITY_FIELD, SWAGGER_FIELD,
};
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;

/// A raw document after dialect detection.
#[derive(Debug)]
pub enum RawDocument {
    Swagger2(swagger2::SwaggerDocument),
    OpenApi3(openapi3::OpenApiDocument),
}

impl RawDocument {
    pub fn parse(raw: &Value, source: &str) -> Result<RawDocument> {
        let parsed = if raw.get(SWAGGER_FIELD).is_some() {
            serde_json::from_value(raw.clone()).map(RawDocument::Swagger2)
        } else if raw.get(OPENAPI_FIELD).is_some() {
            serde_json::from_value(raw.clone()).map(RawDocument::OpenApi3)
        } else {
            return Err(SpecError::load_error(
                "Document declares neither a 'swagger' nor an 'openapi' version",
                source,
            ));
        };
        parsed.map_err(|e| {
            SpecError::load_error(format!("Document structure is not valid: {}", e), source)
        })
    }
}

/// `normalize(rawDocument, sourceId)`: dialect detection followed by extraction.
pub fn normalize(raw: &Value, source: &str) -> Result<ParsedSpec> {
    let spec = match RawDocument::parse(raw, source)? {
        RawDocument::Swagger2(document) => swagger2::extract(&document, source)?,
        RawDocument::OpenApi3(document) => openapi3::extract(&document, source)?,
    };
    log::info!(
        "Normalized '{}' {} ({}): {} endpoints, {} schemas",
        spec.info.title,
        spec.info.version,
        spec.spec_version,
        spec.endpoints.len(),
        spec.schemas.len()
    );
    Ok(spec)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawInfo {
    pub title: String,
    pub description: Option<String>,
    pub version: String,
}

impl From<&RawInfo> for SpecInfo {
    fn from(raw: &RawInfo) -> Self {
        SpecInfo {
            title: raw.title.clone(),
            description: raw.description.clone().unwrap_or_default(),
            version: raw.version.clone(),
        }
    }
}

pub(crate) fn string_field(node: &Value, field: &str) -> Option<String> {
    node.get(field).and_then(Value::as_str).map(str::to_owned)
}

pub(crate) fn bool_field(node: &Value, field: &str) -> bool {
    node.get(field).and_then(Value::as_bool).unwrap_or(false)
}

pub(crate) fn parse_tags(tags: &[Value]) -> Vec<TagInfo> {
    tags.iter()
        .filter_map(|tag| {
            Some(TagInfo {
                name: string_field(tag, NAME_FIELD)?,
                description: string_field(tag, DESCRIPTION_FIELD),
            })
        })
        .collect()
}

/// Requirement alternatives; entries that are not objects of scope lists are dropped.
pub(crate) fn parse_security(requirements: &[Value]) -> Vec<SecurityRequirement> {
    requirements
        .iter()
        .filter_map(Value::as_object)
        .map(|requirement| {
            requirement
                .iter()
                .map(|(scheme, scopes)| {
                    let scopes = scopes
                        .as_array()
                        .map(|scopes| {
                            scopes
                                .iter()
                                .filter_map(Value::as_str)
                                .map(str::to_owned)
                                .collect()
                        })
                        .unwrap_or_default();
                    (scheme.clone(), scopes)
                })
                .collect()
        })
        .collect()
}

pub(crate) fn parse_scopes(node: &Value) -> IndexMap<String, String> {
    node.get("scopes")
        .and_then(Value::as_object)
        .map(|scopes| {
            scopes
                .iter()
                .map(|(scope, description)| {
                    (
                        scope.clone(),
                        description.as_str().unwrap_or_default().to_string(),
                    )
                })
                .collect()
        })
        .unwrap_or_default()
}

pub(crate) fn parse_oauth_flow(node: &Value) -> OAuthFlow {
    OAuthFlow {
        authorization_url: string_field(node, "authorizationUrl"),
        token_url: string_field(node, "tokenUrl"),
        refresh_url: string_field(node, "refreshUrl"),
        scopes: parse_scopes(node),
    }
}

/// Name and location of a parameter node, or `None` (with a warning) when either is unusable.
///
/// Locations outside `path|query|header|cookie` are returned as raw strings so the 2.0
/// extractor can pick out `body` and `formData` before they are rejected.
pub(crate) fn parameter_identity<'v>(raw: &'v Value, context: &str) -> Option<(&'v str, &'v str)> {
    let name = raw.get(NAME_FIELD).and_then(Value::as_str);
    let location = raw.get(IN_FIELD).and_then(Value::as_str);
    match (name, location) {
        (Some(name), Some(location)) if !name.is_empty() => Some((name, location)),
        _ => {
            log::warn!("Skipping parameter without a name or location in {}", context);
            None
        }
    }
}

/// Builds a [`Parameter`] for one of the four standard locations.
pub(crate) fn standard_parameter(
    raw: &Value,
    name: &str,
    location: &str,
    schema: JsonSchema,
    context: &str,
) -> Option<Parameter> {
    let location = match ParameterLocation::from_str(location) {
        Ok(location) => location,
        Err(e) => {
            log::warn!("Skipping parameter '{}' in {}: {}", name, context, e);
            return None;
        }
    };
    let example = raw
        .get(EXAMPLE_FIELD)
        .cloned()
        .or_else(|| schema.example.clone());
    Some(Parameter {
        name: name.to_string(),
        location,
        required: location == ParameterLocation::Path || bool_field(raw, REQUIRED_FIELD),
        deprecated: bool_field(raw, "deprecated"),
        schema,
        description: string_field(raw, DESCRIPTION_FIELD).unwrap_or_default(),
        example,
    })
}

/// Path-level then operation-level parameter nodes, deduplicated by `(location, name)`;
/// an operation-level node replaces a path-level one in place. Nodes without a usable
/// name or location are dropped here.
pub(crate) fn merged_parameter_nodes<'v>(
    path_item: &'v Value,
    operation: &'v Value,
    context: &str,
) -> Vec<(&'v str, &'v str, &'v Value)> {
    let mut merged: IndexMap<(&str, &str), &Value> = IndexMap::new();
    for raw in parameter_nodes(path_item)
        .iter()
        .chain(parameter_nodes(operation))
    {
        if let Some((name, location)) = parameter_identity(raw, context) {
            merged.insert((location, name), raw);
        }
    }
    merged
        .into_iter()
        .map(|((location, name), raw)| (name, location, raw))
        .collect()
}

/// Security scheme shape for an `apiKey` node (identical in both dialects).
pub(crate) fn api_key_kind(raw: &Value) -> Option<SecuritySchemeKind> {
    let location = match raw.get(IN_FIELD).and_then(Value::as_str)? {
        "query" => ApiKeyLocation::Query,
        "header" => ApiKeyLocation::Header,
        "cookie" => ApiKeyLocation::Cookie,
        _ => return None,
    };
    Some(SecuritySchemeKind::ApiKey {
        location,
        parameter_name: string_field(raw, NAME_FIELD)?,
    })
}

/// Well-formed response entries of an operation, parsed with the dialect's `parse_one`.
pub(crate) fn parse_responses(
    operation: &Value,
    context: &str,
    mut parse_one: impl FnMut(&Value, String) -> ResponseDefinition,
) -> IndexMap<String, ResponseDefinition> {
    let Some(responses) = operation.get(RESPONSES_FIELD).and_then(Value::as_object) else {
        return IndexMap::new();
    };
    let mut parsed = IndexMap::with_capacity(responses.len());
    for (status, response) in responses {
        if status.starts_with("x-") {
            continue;
        }
        let description = match response.get(DESCRIPTION_FIELD).and_then(Value::as_str) {
            Some(description) if response.is_object() => description.to_string(),
            _ => {
                log::warn!(
                    "Skipping response '{}' in {}: not an object with a description",
                    status,
                    context
                );
                continue;
            }
        };
        parsed.insert(status.clone(), parse_one(response, description));
    }
    parsed
}

/// Walks every recognized operation in document order.
///
/// `visit` receives the normalized path, the method, the path item and the operation node.
pub(crate) fn for_each_operation(
    paths: &IndexMap<String, Value>,
    mut visit: impl FnMut(&str, HttpMethod, &Value, &Value),
) {
    for (path, item) in paths {
        let Some(operations) = item.as_object() else {
            log::warn!("Skipping path item '{}': not an object", path);
            continue;
        };
        let path = crate::types::normalize_path(path);
        for (key, operation) in operations {
            let Some(method) = HttpMethod::ALL
                .into_iter()
                .find(|method| method.as_str() == key)
            else {
                continue;
            };
            if !operation.is_object() {
                log::warn!("Skipping {} {}: operation is not an object", method, path);
                continue;
            }
            visit(&path, method, item, operation);
        }
    }
}

/// The parameter list of a path item or operation.
pub(crate) fn parameter_nodes(node: &Value) -> &[Value] {
    node.get(PARAMETERS_FIELD)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

/// Endpoint with the dialect-independent operation fields filled in.
pub(crate) fn endpoint_shell(
    path: &str,
    method: HttpMethod,
    operation: &Value,
    global_security: &[SecurityRequirement],
) -> Endpoint {
    let tags = operation
        .get("tags")
        .and_then(Value::as_array)
        .map(|tags| {
            tags.iter()
                .filter_map(Value::as_str)
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default();
    let security = match operation.get(SECURITY_FIELD).and_then(Value::as_array) {
        Some(requirements) => parse_security(requirements),
        None => global_security.to_vec(),
    };
    Endpoint {
        path: path.to_string(),
        method,
        operation_id: string_field(operation, "operationId"),
        summary: string_field(operation, "summary").unwrap_or_default(),
        description: string_field(operation, DESCRIPTION_FIELD).unwrap_or_default(),
        tags,
        deprecated: bool_field(operation, "deprecated"),
        parameters: Vec::new(),
        request_body: None,
        responses: IndexMap::new(),
        security,
    }
}

pub(crate) fn parse_schemas(schemas: &IndexMap<String, Value>) -> IndexMap<String, JsonSchema> {
    schemas
        .iter()
        .map(|(name, schema)| (name.clone(), JsonSchema::from_value(schema)))
        .collect()
}
