use crate::error::{Result, SpecError};
use crate::normalizer::{
    RawInfo, api_key_kind, bool_field, endpoint_shell, for_each_operation, merged_parameter_nodes,
    parse_oauth_flow, parse_responses, parse_schemas, parse_security, parse_tags,
    standard_parameter, string_field,
};
use crate::types::schema::JsonSchema;
use crate::types::version::SpecVersion;
use crate::types::{
    MediaType, ParsedSpec, RequestBody, ResponseDefinition, SecurityScheme, SecuritySchemeKind,
    Server, endpoint_key,
};
use crate::{DEFAULT_CONTENT_TYPE, DESCRIPTION_FIELD, EXAMPLES_FIELD, REQUIRED_FIELD, SCHEMA_FIELD};
use chrono::Utc;
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::str::FromStr;

const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";
const MULTIPART_FORM_DATA: &str = "multipart/form-data";

/// Keywords a non-body 2.0 parameter (or header) carries inline instead of in a `schema`.
const INLINE_SCHEMA_KEYWORDS: [&str; 16] = [
    "type",
    "format",
    "items",
    "enum",
    "default",
    "minimum",
    "maximum",
    "exclusiveMinimum",
    "exclusiveMaximum",
    "minLength",
    "maxLength",
    "pattern",
    "minItems",
    "maxItems",
    "uniqueItems",
    "multipleOf",
];

/// The parts of a Swagger 2.0 document the extractor reads.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwaggerDocument {
    pub swagger: String,
    #[serde(default)]
    pub info: RawInfo,
    pub host: Option<String>,
    pub base_path: Option<String>,
    #[serde(default)]
    pub schemes: Vec<String>,
    #[serde(default)]
    pub consumes: Vec<String>,
    #[serde(default)]
    pub produces: Vec<String>,
    #[serde(default)]
    pub paths: IndexMap<String, Value>,
    #[serde(default)]
    pub definitions: IndexMap<String, Value>,
    #[serde(default)]
    pub security_definitions: IndexMap<String, Value>,
    #[serde(default)]
    pub security: Vec<Value>,
    #[serde(default)]
    pub tags: Vec<Value>,
}

impl SwaggerDocument {
    /// One server per declared scheme (default `https`) built from `host` + `basePath`.
    fn servers(&self) -> Vec<Server> {
        let base_path = self.base_path.clone().unwrap_or_default();
        let Some(host) = &self.host else {
            if base_path.is_empty() {
                return Vec::new();
            }
            return vec![server(base_path)];
        };
        if self.schemes.is_empty() {
            return vec![server(format!("https://{}{}", host, base_path))];
        }
        self.schemes
            .iter()
            .map(|scheme| server(format!("{}://{}{}", scheme, host, base_path)))
            .collect()
    }
}

fn server(url: String) -> Server {
    Server {
        url,
        description: None,
        variables: IndexMap::new(),
    }
}

pub(crate) fn extract(document: &SwaggerDocument, source: &str) -> Result<ParsedSpec> {
    let spec_version = SpecVersion::from_str(&document.swagger)
        .map_err(|e| SpecError::load_error(e.to_string(), source))?;
    let security = parse_security(&document.security);

    let mut endpoints = IndexMap::new();
    for_each_operation(&document.paths, |path, method, item, operation| {
        let context = endpoint_key(method.as_str(), path);
        let consumes = media_types(operation, "consumes", &document.consumes);
        let produces = media_types(operation, "produces", &document.produces);
        let mut endpoint = endpoint_shell(path, method, operation, &security);

        let mut body = None;
        let mut form_fields = Vec::new();
        for (name, location, raw) in merged_parameter_nodes(item, operation, &context) {
            match location {
                "body" => body = Some(raw),
                "formData" => form_fields.push((name, raw)),
                _ => {
                    let schema = inline_schema(raw);
                    if let Some(parameter) =
                        standard_parameter(raw, name, location, schema, &context)
                    {
                        endpoint.parameters.push(parameter);
                    }
                }
            }
        }

        endpoint.request_body = match body {
            Some(body) => Some(body_parameter(body, &consumes)),
            None if !form_fields.is_empty() => Some(form_body(&form_fields)),
            None => None,
        };
        endpoint.responses = parse_responses(operation, &context, |response, description| {
            parse_response(response, description, &produces)
        });
        endpoints.insert(endpoint.key(), endpoint);
    });

    Ok(ParsedSpec {
        spec_version,
        info: (&document.info).into(),
        servers: document.servers(),
        tags: parse_tags(&document.tags),
        endpoints,
        schemas: parse_schemas(&document.definitions),
        security_schemes: document
            .security_definitions
            .iter()
            .filter_map(|(name, raw)| parse_security_definition(name, raw))
            .collect(),
        security,
        loaded_at: Utc::now(),
        source: source.to_string(),
    })
}

/// Operation-level list over document-level list, falling back to `application/json`.
fn media_types(operation: &Value, field: &str, document_level: &[String]) -> Vec<String> {
    let operation_level: Vec<String> = operation
        .get(field)
        .and_then(Value::as_array)
        .map(|types| {
            types
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default();
    if !operation_level.is_empty() {
        operation_level
    } else if !document_level.is_empty() {
        document_level.to_vec()
    } else {
        vec![DEFAULT_CONTENT_TYPE.to_string()]
    }
}

/// Lifts the inline type keywords of a 2.0 parameter or header into a schema.
/// `type: file` becomes a binary string.
fn inline_schema(raw: &Value) -> JsonSchema {
    let mut schema = Map::new();
    for keyword in INLINE_SCHEMA_KEYWORDS {
        if let Some(value) = raw.get(keyword) {
            schema.insert(keyword.to_string(), value.clone());
        }
    }
    if schema.get("type").and_then(Value::as_str) == Some("file") {
        schema.insert("type".to_string(), Value::from("string"));
        schema.insert("format".to_string(), Value::from("binary"));
    }
    JsonSchema::from_value(&Value::Object(schema))
}

fn body_parameter(body: &Value, consumes: &[String]) -> RequestBody {
    let schema = body
        .get(SCHEMA_FIELD)
        .map(JsonSchema::from_value)
        .unwrap_or_default();
    let content = consumes
        .iter()
        .map(|content_type| {
            let media_type = MediaType {
                schema: Some(schema.clone()),
                ..MediaType::default()
            };
            (content_type.clone(), media_type)
        })
        .collect();
    RequestBody {
        description: string_field(body, DESCRIPTION_FIELD).unwrap_or_default(),
        required: bool_field(body, REQUIRED_FIELD),
        content,
    }
}

/// Folds `formData` parameters into one object schema.
fn form_body(fields: &[(&str, &Value)]) -> RequestBody {
    let mut properties = IndexMap::new();
    let mut required = Vec::new();
    let mut has_file = false;
    for (name, raw) in fields {
        has_file |= raw.get("type").and_then(Value::as_str) == Some("file");
        let mut property = inline_schema(raw);
        property.description = string_field(raw, DESCRIPTION_FIELD);
        if bool_field(raw, REQUIRED_FIELD) {
            required.push(name.to_string());
        }
        properties.insert(name.to_string(), property);
    }
    let schema = JsonSchema {
        properties: Some(properties),
        required,
        ..JsonSchema::of_type("object")
    };
    let content_type = if has_file {
        MULTIPART_FORM_DATA
    } else {
        FORM_URLENCODED
    };
    let any_required = !schema.required.is_empty();
    let mut content = IndexMap::new();
    content.insert(
        content_type.to_string(),
        MediaType {
            schema: Some(schema),
            ..MediaType::default()
        },
    );
    RequestBody {
        description: String::new(),
        required: any_required,
        content,
    }
}

fn parse_response(
    response: &Value,
    description: String,
    produces: &[String],
) -> ResponseDefinition {
    let examples = response.get(EXAMPLES_FIELD).and_then(Value::as_object);
    let content = match response.get(SCHEMA_FIELD) {
        Some(schema) => {
            let schema = JsonSchema::from_value(schema);
            produces
                .iter()
                .map(|content_type| {
                    let media_type = MediaType {
                        schema: Some(schema.clone()),
                        example: examples.and_then(|examples| examples.get(content_type).cloned()),
                        examples: IndexMap::new(),
                    };
                    (content_type.clone(), media_type)
                })
                .collect()
        }
        None => IndexMap::new(),
    };
    let headers = response
        .get("headers")
        .and_then(Value::as_object)
        .map(|headers| {
            headers
                .iter()
                .map(|(name, header)| (name.clone(), inline_schema(header)))
                .collect()
        })
        .unwrap_or_default();
    ResponseDefinition {
        description,
        content,
        headers,
    }
}

/// 2.0 single-flow oauth2 names mapped onto 3.x flow keys.
fn flow_name(flow: &str) -> Option<&'static str> {
    match flow {
        "implicit" => Some("implicit"),
        "password" => Some("password"),
        "application" => Some("clientCredentials"),
        "accessCode" => Some("authorizationCode"),
        _ => None,
    }
}

fn parse_security_definition(name: &str, raw: &Value) -> Option<SecurityScheme> {
    let scheme_type = raw.get("type").and_then(Value::as_str).unwrap_or_default();
    let kind = match scheme_type {
        "basic" => Some(SecuritySchemeKind::Http {
            scheme: "basic".to_string(),
            bearer_format: None,
        }),
        "apiKey" => api_key_kind(raw),
        "oauth2" => raw
            .get("flow")
            .and_then(Value::as_str)
            .and_then(flow_name)
            .map(|flow| {
                let mut flows = IndexMap::new();
                flows.insert(flow.to_string(), parse_oauth_flow(raw));
                SecuritySchemeKind::OAuth2 { flows }
            }),
        _ => None,
    };
    let Some(kind) = kind else {
        log::warn!(
            "Skipping security definition '{}' of unsupported or incomplete type '{}'",
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
    use crate::types::ParameterLocation;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn document() -> Value {
        json!({
            "swagger": "2.0",
            "info": {"title": "Petstore", "version": "1.0.0"},
            "host": "petstore.example.com",
            "basePath": "/v1",
            "schemes": ["https", "http"],
            "produces": ["application/json"],
            "paths": {
                "/pets": {
                    "get": {
                        "parameters": [
                            {"name": "limit", "in": "query", "type": "integer", "maximum": 100},
                            {"in": "query", "type": "string"}
                        ],
                        "responses": {
                            "200": {
                                "description": "pets",
                                "schema": {"type": "array", "items": {"type": "object"}},
                                "headers": {"X-Next": {"type": "string"}},
                                "examples": {"application/json": [{"id": 1}]}
                            },
                            "default": {"description": "error"}
                        }
                    },
                    "post": {
                        "consumes": ["application/json", "application/xml"],
                        "parameters": [
                            {"name": "pet", "in": "body", "required": true, "schema": {"type": "object", "required": ["name"]}}
                        ],
                        "responses": {"201": {"description": "created"}}
                    }
                },
                "/pets/{id}/photo": {
                    "post": {
                        "parameters": [
                            {"name": "id", "in": "path", "type": "integer"},
                            {"name": "file", "in": "formData", "type": "file", "required": true},
                            {"name": "caption", "in": "formData", "type": "string"}
                        ],
                        "responses": {"200": {"description": "ok"}}
                    }
                },
                "/login": {
                    "post": {
                        "parameters": [
                            {"name": "user", "in": "formData", "type": "string"}
                        ],
                        "responses": {"200": {"description": "ok"}}
                    }
                }
            },
            "definitions": {"Pet": {"type": "object"}},
            "securityDefinitions": {
                "basicAuth": {"type": "basic"},
                "key": {"type": "apiKey", "in": "header", "name": "X-API-Key"},
                "oauth": {"type": "oauth2", "flow": "accessCode", "authorizationUrl": "https://a", "tokenUrl": "https://t", "scopes": {"write": "Write"}}
            }
        })
    }

    #[test]
    fn test_servers_from_host_and_schemes() {
        let spec = normalize(&document(), "petstore.json").unwrap();
        assert_eq!(spec.spec_version, SpecVersion::Swagger2);
        let urls: Vec<&str> = spec.servers.iter().map(|s| s.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://petstore.example.com/v1",
                "http://petstore.example.com/v1"
            ]
        );
        assert!(spec.schemas.contains_key("Pet"));
    }

    #[test]
    fn test_inline_parameter_schema_and_skipped_parameter() {
        let spec = normalize(&document(), "petstore.json").unwrap();
        let get = spec.endpoint("/pets", "get").unwrap();
        assert_eq!(get.parameters.len(), 1);
        let limit = &get.parameters[0];
        assert_eq!(limit.location, ParameterLocation::Query);
        assert_eq!(limit.schema.primary_type(), Some("integer"));
        assert_eq!(limit.schema.maximum, Some(100.0));
        assert_eq!(get.responses["200"].headers["X-Next"].primary_type(), Some("string"));
        assert_eq!(
            get.responses["200"].content["application/json"].example,
            Some(json!([{"id": 1}]))
        );
        assert!(get.responses["default"].content.is_empty());
    }

    #[test]
    fn test_body_parameter_becomes_request_body() {
        let spec = normalize(&document(), "petstore.json").unwrap();
        let post = spec.endpoint("/pets", "post").unwrap();
        assert!(post.parameters.is_empty());
        let body = post.request_body.as_ref().unwrap();
        assert!(body.required);
        let content_types: Vec<&str> = body.content.keys().map(String::as_str).collect();
        assert_eq!(content_types, vec!["application/json", "application/xml"]);
        assert_eq!(
            body.content["application/json"].schema.as_ref().unwrap().required,
            vec!["name".to_string()]
        );
    }

    #[test]
    fn test_form_data_folds_into_body() {
        let spec = normalize(&document(), "petstore.json").unwrap();
        let upload = spec.endpoint("/pets/{id}/photo", "post").unwrap();
        assert_eq!(upload.parameters.len(), 1);
        let body = upload.request_body.as_ref().unwrap();
        let media = &body.content["multipart/form-data"];
        let schema = media.schema.as_ref().unwrap();
        assert_eq!(schema.required, vec!["file".to_string()]);
        let file = &schema.properties.as_ref().unwrap()["file"];
        assert_eq!(file.format.as_deref(), Some("binary"));
        assert!(body.required);

        let login = spec.endpoint("/login", "post").unwrap();
        let body = login.request_body.as_ref().unwrap();
        assert!(body.content.contains_key("application/x-www-form-urlencoded"));
        assert!(!body.required);
    }

    #[test]
    fn test_security_definitions_mapped() {
        let spec = normalize(&document(), "petstore.json").unwrap();
        assert!(matches!(
            &spec.security_scheme("basicAuth").unwrap().kind,
            SecuritySchemeKind::Http { scheme, .. } if scheme == "basic"
        ));
        assert!(matches!(
            &spec.security_scheme("key").unwrap().kind,
            SecuritySchemeKind::ApiKey { parameter_name, .. } if parameter_name == "X-API-Key"
        ));
        match &spec.security_scheme("oauth").unwrap().kind {
            SecuritySchemeKind::OAuth2 { flows } => {
                let flow = &flows["authorizationCode"];
                assert_eq!(flow.authorization_url.as_deref(), Some("https://a"));
                assert_eq!(flow.scopes["write"], "Write");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_servers_without_host() {
        let raw = json!({"swagger": "2.0", "info": {"title": "t", "version": "1"}, "basePath": "/api", "paths": {}});
        let spec = normalize(&raw, "s").unwrap();
        assert_eq!(spec.servers.len(), 1);
        assert_eq!(spec.servers[0].url, "/api");
    }

    #[test]
    fn test_body_media_types_follow_consumes() {
        let raw = json!({
            "swagger": "2.0",
            "info": {"title": "t", "version": "1"},
            "consumes": ["application/xml"],
            "paths": {
                "/orders": {
                    "post": {
                        "parameters": [
                            {"name": "order", "in": "body", "schema": {"type": "object"}}
                        ],
                        "responses": {"201": {"description": "created"}}
                    }
                }
            }
        });
        let spec = normalize(&raw, "s").unwrap();
        let body = spec.endpoint("/orders", "post").unwrap().request_body.as_ref().unwrap();
        let content_types: Vec<&str> = body.content.keys().map(String::as_str).collect();
        assert_eq!(content_types, vec!["application/xml"]);
    }
}
