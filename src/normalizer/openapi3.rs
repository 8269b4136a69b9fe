use crate::error::{Result, SpecError};
use crate::normalizer::{
    RawInfo, api_key_kind, bool_field, endpoint_shell, for_each_operation, merged_parameter_nodes,
    parse_oauth_flow, parse_responses, parse_schemas, parse_security, parse_tags,
    standard_parameter, string_field,
};
use crate::types::schema::JsonSchema;
use crate::types::version::SpecVersion;
use crate::types::{
    MediaType, Parameter, ParsedSpec, RequestBody, ResponseDefinition, SecurityScheme,
    SecuritySchemeKind, Server, ServerVariable, endpoint_key,
};
use crate::{
    CONTENT_FIELD, DESCRIPTION_FIELD, EXAMPLE_FIELD, EXAMPLES_FIELD, REQUEST_BODY_FIELD,
    REQUIRED_FIELD, SCHEMA_FIELD,
};
use chrono::Utc;
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;

/// The parts of an OpenAPI 3.0 / 3.1 document the extractor reads.
#[derive(Debug, Deserialize)]
pub struct OpenApiDocument {
    pub openapi: String,
    #[serde(default)]
    pub info: RawInfo,
    #[serde(default)]
    pub servers: Vec<Value>,
    #[serde(default)]
    pub paths: IndexMap<String, Value>,
    #[serde(default)]
    pub components: Components,
    #[serde(default)]
    pub security: Vec<Value>,
    #[serde(default)]
    pub tags: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Components {
    pub schemas: IndexMap<String, Value>,
    pub security_schemes: IndexMap<String, Value>,
}

pub(crate) fn extract(document: &OpenApiDocument, source: &str) -> Result<ParsedSpec> {
    let spec_version = SpecVersion::from_str(&document.openapi)
        .map_err(|e| SpecError::load_error(e.to_string(), source))?;
    let security = parse_security(&document.security);

    let mut endpoints = IndexMap::new();
    for_each_operation(&document.paths, |path, method, item, operation| {
        let context = endpoint_key(method.as_str(), path);
        let mut endpoint = endpoint_shell(path, method, operation, &security);
        endpoint.parameters = merged_parameter_nodes(item, operation, &context)
            .into_iter()
            .filter_map(|(name, location, raw)| parse_parameter(raw, name, location, &context))
            .collect();
        endpoint.request_body = operation
            .get(REQUEST_BODY_FIELD)
            .and_then(|body| parse_request_body(body, &context));
        endpoint.responses = parse_responses(operation, &context, parse_response);
        endpoints.insert(endpoint.key(), endpoint);
    });

    Ok(ParsedSpec {
        spec_version,
        info: (&document.info).into(),
        servers: document.servers.iter().filter_map(parse_server).collect(),
        tags: parse_tags(&document.tags),
        endpoints,
        schemas: parse_schemas(&document.components.schemas),
        security_schemes: document
            .components
            .security_schemes
            .iter()
            .filter_map(|(name, raw)| parse_security_scheme(name, raw))
            .collect(),
        security,
        loaded_at: Utc::now(),
        source: source.to_string(),
    })
}

fn parse_parameter(raw: &Value, name: &str, location: &str, context: &str) -> Option<Parameter> {
    // A parameter may describe itself through `content` instead of `schema`.
    let schema = raw
        .get(SCHEMA_FIELD)
        .or_else(|| {
            raw.get(CONTENT_FIELD)
                .and_then(Value::as_object)
                .and_then(|content| content.values().next())
                .and_then(|media| media.get(SCHEMA_FIELD))
        })
        .map(JsonSchema::from_value)
        .unwrap_or_default();
    let mut parameter = standard_parameter(raw, name, location, schema, context)?;
    if parameter.example.is_none() {
        parameter.example = first_named_example(raw);
    }
    Some(parameter)
}

fn first_named_example(node: &Value) -> Option<Value> {
    node.get(EXAMPLES_FIELD)
        .and_then(Value::as_object)
        .and_then(|examples| examples.values().next())
        .map(example_value)
}

/// An Example Object contributes its `value`; anything else is kept as is.
fn example_value(example: &Value) -> Value {
    example.get("value").cloned().unwrap_or_else(|| example.clone())
}

fn parse_content(node: &Value) -> IndexMap<String, MediaType> {
    let Some(content) = node.get(CONTENT_FIELD).and_then(Value::as_object) else {
        return IndexMap::new();
    };
    content
        .iter()
        .map(|(content_type, media)| {
            let examples = media
                .get(EXAMPLES_FIELD)
                .and_then(Value::as_object)
                .map(|examples| {
                    examples
                        .iter()
                        .map(|(name, example)| (name.clone(), example_value(example)))
                        .collect()
                })
                .unwrap_or_default();
            let media_type = MediaType {
                schema: media.get(SCHEMA_FIELD).map(JsonSchema::from_value),
                example: media.get(EXAMPLE_FIELD).cloned(),
                examples,
            };
            (content_type.clone(), media_type)
        })
        .collect()
}

fn parse_request_body(body: &Value, context: &str) -> Option<RequestBody> {
    if !body.is_object() {
        log::warn!("Ignoring request body of {}: not an object", context);
        return None;
    }
    Some(RequestBody {
        description: string_field(body, DESCRIPTION_FIELD).unwrap_or_default(),
        required: bool_field(body, REQUIRED_FIELD),
        content: parse_content(body),
    })
}

fn parse_response(response: &Value, description: String) -> ResponseDefinition {
    let headers = response
        .get("headers")
        .and_then(Value::as_object)
        .map(|headers| {
            headers
                .iter()
                .map(|(name, header)| {
                    let schema = header
                        .get(SCHEMA_FIELD)
                        .map(JsonSchema::from_value)
                        .unwrap_or_default();
                    (name.clone(), schema)
                })
                .collect()
        })
        .unwrap_or_default();
    ResponseDefinition {
        description,
        content: parse_content(response),
        headers,
    }
}

fn parse_server(raw: &Value) -> Option<Server> {
    let Some(url) = string_field(raw, "url") else {
        log::warn!("Skipping server entry without a url");
        return None;
    };
    let variables = raw
        .get("variables")
        .and_then(Value::as_object)
        .map(|variables| {
            variables
                .iter()
                .map(|(name, variable)| {
                    let default = match variable.get("default") {
                        Some(Value::String(default)) => default.clone(),
                        Some(other) => other.to_string(),
                        None => String::new(),
                    };
                    let enum_values = variable
                        .get("enum")
                        .and_then(Value::as_array)
                        .map(|values| {
                            values
                                .iter()
                                .filter_map(Value::as_str)
                                .map(str::to_owned)
                                .collect()
                        })
                        .unwrap_or_default();
                    let variable = ServerVariable {
                        default,
                        enum_values,
                        description: string_field(variable, DESCRIPTION_FIELD),
                    };
                    (name.clone(), variable)
                })
                .collect()
        })
        .unwrap_or_default();
    Some(Server {
        url,
        description: string_field(raw, DESCRIPTION_FIELD),
        variables,
    })
}

fn parse_security_scheme(name: &str, raw: &Value) -> Option<SecurityScheme> {
    let scheme_type = raw.get("type").and_then(Value::as_str).unwrap_or_default();
    let kind = match scheme_type {
        "apiKey" => api_key_kind(raw),
        "http" => string_field(raw, "scheme").map(|scheme| SecuritySchemeKind::Http {
            scheme,
            bearer_format: string_field(raw, "bearerFormat"),
        }),
        "oauth2" => Some(SecuritySchemeKind::OAuth2 {
            flows: raw
                .get("flows")
                .and_then(Value::as_object)
                .map(|flows| {
                    flows
                        .iter()
                        .map(|(flow, node)| (flow.clone(), parse_oauth_flow(node)))
                        .collect()
                })
                .unwrap_or_default(),
        }),
        "openIdConnect" => string_field(raw, "openIdConnectUrl")
            .map(|open_id_connect_url| SecuritySchemeKind::OpenIdConnect { open_id_connect_url }),
        _ => None,
    };
    let Some(kind) = kind else {
        log::warn!(
            "Skipping security scheme '{}' of unsupported or incomplete type '{}'",
            name,
            scheme_type
        );
        return None;
    };
    Some(SecurityScheme {
        name: name.to_string(),
        description: string_field(raw, DESCRIPTION_FIELD),
        kind,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::normalize;
    use crate::types::{HttpMethod, ParameterLocation};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn document() -> Value {
        json!({
            "openapi": "3.0.3",
            "info": {"title": "Users API", "description": "Manage users", "version": "2.1.0"},
            "servers": [
                {"url": "https://{env}.example.com/v2", "variables": {"env": {"default": "api", "enum": ["api", "staging"]}}}
            ],
            "tags": [{"name": "Users", "description": "User operations"}],
            "security": [{"bearer": []}],
            "paths": {
                "users/{id}": {
                    "parameters": [
                        {"name": "id", "in": "path", "schema": {"type": "string"}, "description": "inherited"},
                        {"name": "verbose", "in": "query", "schema": {"type": "boolean"}}
                    ],
                    "get": {
                        "operationId": "getUser",
                        "tags": ["Users"],
                        "parameters": [
                            {"name": "id", "in": "path", "schema": {"type": "integer"}, "description": "own"}
                        ],
                        "responses": {
                            "200": {
                                "description": "found",
                                "headers": {"X-Rate-Limit": {"schema": {"type": "integer"}}},
                                "content": {"application/json": {"schema": {"type": "object"}}}
                            },
                            "404": {"description": "missing"}
                        }
                    },
                    "put": {
                        "security": [],
                        "requestBody": {
                            "required": true,
                            "content": {
                                "application/xml": {"schema": {"type": "string"}},
                                "application/json": {
                                    "schema": {"type": "object"},
                                    "examples": {"basic": {"summary": "s", "value": {"name": "Ann"}}}
                                }
                            }
                        },
                        "responses": {"204": {"description": "saved"}}
                    },
                    "x-owner": {"team": "identity"}
                }
            },
            "components": {
                "schemas": {"User": {"type": "object", "properties": {"id": {"type": "integer"}}}},
                "securitySchemes": {
                    "bearer": {"type": "http", "scheme": "bearer", "bearerFormat": "JWT"},
                    "oauth": {"type": "oauth2", "flows": {"clientCredentials": {"tokenUrl": "https://auth/token", "scopes": {"read": "Read"}}}},
                    "tls": {"type": "mutualTLS"}
                }
            }
        })
    }

    #[test]
    fn test_extract_openapi3_document() {
        let spec = normalize(&document(), "users.json").unwrap();
        assert_eq!(spec.spec_version, SpecVersion::V30x);
        assert_eq!(spec.info.title, "Users API");
        assert_eq!(spec.info.description, "Manage users");
        assert_eq!(spec.servers[0].resolved_url(), "https://api.example.com/v2");
        assert_eq!(spec.tags[0].name, "Users");
        assert_eq!(spec.source, "users.json");

        let keys: Vec<&str> = spec.endpoints.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["get /users/{id}", "put /users/{id}"]);

        let get = spec.endpoint("/users/{id}", "GET").unwrap();
        assert_eq!(get.method, HttpMethod::Get);
        assert_eq!(get.operation_id.as_deref(), Some("getUser"));
        assert_eq!(get.parameters.len(), 2);
        assert_eq!(get.parameters[0].description, "own");
        assert_eq!(get.parameters[0].schema.primary_type(), Some("integer"));
        assert!(get.parameters[0].required);
        assert_eq!(get.parameters[1].location, ParameterLocation::Query);
        assert!(!get.parameters[1].required);
        assert!(get.request_body.is_none());
        assert_eq!(get.responses["200"].headers["X-Rate-Limit"].primary_type(), Some("integer"));
        assert!(get.responses["404"].content.is_empty());
        assert_eq!(get.security.len(), 1);
        assert_eq!(get.summary, "");
    }

    #[test]
    fn test_request_body_keeps_content_order_and_examples() {
        let spec = normalize(&document(), "users.json").unwrap();
        let put = spec.endpoint("users/{id}", "put").unwrap();
        assert!(put.security.is_empty());
        let body = put.request_body.as_ref().unwrap();
        assert!(body.required);
        let content_types: Vec<&str> = body.content.keys().map(String::as_str).collect();
        assert_eq!(content_types, vec!["application/xml", "application/json"]);
        assert_eq!(
            body.content["application/json"].examples["basic"],
            json!({"name": "Ann"})
        );
    }

    #[test]
    fn test_security_schemes_skip_unsupported() {
        let spec = normalize(&document(), "users.json").unwrap();
        let names: Vec<&str> = spec
            .security_schemes
            .iter()
            .map(|scheme| scheme.name.as_str())
            .collect();
        assert_eq!(names, vec!["bearer", "oauth"]);
        match &spec.security_scheme("oauth").unwrap().kind {
            SecuritySchemeKind::OAuth2 { flows } => {
                assert_eq!(
                    flows["clientCredentials"].token_url.as_deref(),
                    Some("https://auth/token")
                );
                assert_eq!(flows["clientCredentials"].scopes["read"], "Read");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_openapi31_version() {
        let raw = json!({"openapi": "3.1.0", "info": {"title": "t", "version": "1"}, "paths": {}});
        let spec = normalize(&raw, "s").unwrap();
        assert_eq!(spec.spec_version, SpecVersion::V31x);
        assert!(spec.endpoints.is_empty());
        assert!(spec.servers.is_empty());
    }
}
