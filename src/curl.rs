use crate::error::{Result, SpecError};
use crate::sample::SampleGenerator;
use crate::service::select_content_type;
use crate::types::{Endpoint, Parameter, ParameterLocation, ParsedSpec};
use crate::types::{ApiKeyLocation, SecuritySchemeKind};
use crate::DEFAULT_CONTENT_TYPE;
use indexmap::IndexMap;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Deserialize;
use serde_json::Value;

const FALLBACK_BASE_URL: &str = "http://localhost";
const LINE_CONTINUATION: &str = " \\\n  ";

/// Everything except RFC 3986 unreserved characters.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Caller-supplied values; anything missing is filled from the spec.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CurlOptions {
    pub base_url: Option<String>,
    pub path_params: IndexMap<String, Value>,
    pub query_params: IndexMap<String, Value>,
    pub headers: IndexMap<String, String>,
    pub body: Option<Value>,
    pub content_type: Option<String>,
}

fn encode(text: &str) -> String {
    utf8_percent_encode(text, COMPONENT).to_string()
}

/// Wraps `text` in single quotes for a POSIX shell.
fn shell_quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', r"'\''"))
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn has_header(headers: &[(String, String)], name: &str) -> bool {
    headers
        .iter()
        .any(|(existing, _)| existing.eq_ignore_ascii_case(name))
}

/// Renders endpoints of one spec as cURL command lines.
pub struct CurlBuilder<'s> {
    spec: &'s ParsedSpec,
    generator: SampleGenerator,
    default_content_type: String,
}

impl<'s> CurlBuilder<'s> {
    pub fn new(spec: &'s ParsedSpec, generator: SampleGenerator) -> Self {
        CurlBuilder {
            spec,
            generator,
            default_content_type: DEFAULT_CONTENT_TYPE.to_string(),
        }
    }

    pub fn with_default_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.default_content_type = content_type.into();
        self
    }

    pub fn build(&self, endpoint: &Endpoint, options: &CurlOptions) -> Result<String> {
        if options.body.is_some() && endpoint.request_body.is_none() {
            return Err(SpecError::no_request_body(
                endpoint.path.clone(),
                endpoint.method.as_str(),
            ));
        }

        let mut query: Vec<(String, String)> = Vec::new();
        let mut headers: Vec<(String, String)> = options
            .headers
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();

        for (name, value) in &options.query_params {
            push_query(&mut query, name, value);
        }
        for parameter in endpoint.parameters_in(ParameterLocation::Query) {
            if parameter.required && !options.query_params.contains_key(&parameter.name) {
                push_query(&mut query, &parameter.name, &self.parameter_value(parameter));
            }
        }
        for parameter in endpoint.parameters_in(ParameterLocation::Header) {
            if parameter.required && !has_header(&headers, &parameter.name) {
                let value = scalar_text(&self.parameter_value(parameter));
                headers.push((parameter.name.clone(), value));
            }
        }

        if let Some(content_type) = self.accept(endpoint) {
            if !has_header(&headers, "Accept") {
                headers.push(("Accept".to_string(), content_type));
            }
        }

        let body = match &endpoint.request_body {
            Some(request_body) => {
                let preferred = options
                    .content_type
                    .as_deref()
                    .unwrap_or(&self.default_content_type);
                match select_content_type(&request_body.content, preferred) {
                    Some((content_type, media)) => {
                        let payload = match (&options.body, &media.schema) {
                            (Some(body), _) => Some(body.clone()),
                            (None, Some(schema)) => Some(self.generator.generate(schema)),
                            (None, None) => None,
                        };
                        payload.map(|payload| (content_type.clone(), payload))
                    }
                    None => None,
                }
            }
            None => None,
        };
        if let Some((content_type, _)) = &body {
            if !has_header(&headers, "Content-Type") && !content_type.starts_with("multipart/") {
                headers.push(("Content-Type".to_string(), content_type.clone()));
            }
        }

        let basic_auth = self.apply_security(endpoint, &mut headers, &mut query);

        let mut url = format!("{}{}", self.base_url(options), self.expand_path(endpoint, options));
        if !query.is_empty() {
            let pairs: Vec<String> = query
                .iter()
                .map(|(name, value)| format!("{}={}", encode(name), encode(value)))
                .collect();
            url.push('?');
            url.push_str(&pairs.join("&"));
        }

        let mut parts = vec![format!(
            "curl -X {} {}",
            endpoint.method.as_str().to_uppercase(),
            shell_quote(&url)
        )];
        if basic_auth {
            parts.push(format!("-u {}", shell_quote("<USERNAME>:<PASSWORD>")));
        }
        for (name, value) in &headers {
            parts.push(format!("-H {}", shell_quote(&format!("{}: {}", name, value))));
        }
        if let Some((content_type, payload)) = &body {
            parts.extend(body_arguments(content_type, payload));
        }
        Ok(parts.join(LINE_CONTINUATION))
    }

    /// Adds placeholders for the endpoint's first security requirement. Returns whether
    /// HTTP basic credentials are needed.
    fn apply_security(
        &self,
        endpoint: &Endpoint,
        headers: &mut Vec<(String, String)>,
        query: &mut Vec<(String, String)>,
    ) -> bool {
        let mut basic_auth = false;
        let Some(requirement) = endpoint.security.first() else {
            return basic_auth;
        };
        for scheme_name in requirement.keys() {
            let Some(definition) = self.spec.security_scheme(scheme_name) else {
                log::warn!("Unknown security scheme {} on {}", scheme_name, endpoint.key());
                continue;
            };
            match &definition.kind {
                SecuritySchemeKind::Http { scheme, .. } if scheme.eq_ignore_ascii_case("basic") => {
                    basic_auth = true;
                }
                SecuritySchemeKind::Http { scheme, .. }
                    if !scheme.eq_ignore_ascii_case("bearer") =>
                {
                    if !has_header(headers, "Authorization") {
                        headers.push((
                            "Authorization".to_string(),
                            format!("{} <CREDENTIALS>", scheme),
                        ));
                    }
                }
                SecuritySchemeKind::Http { .. }
                | SecuritySchemeKind::OAuth2 { .. }
                | SecuritySchemeKind::OpenIdConnect { .. } => {
                    if !has_header(headers, "Authorization") {
                        headers.push(("Authorization".to_string(), "Bearer <TOKEN>".to_string()));
                    }
                }
                SecuritySchemeKind::ApiKey {
                    location,
                    parameter_name,
                } => match location {
                    ApiKeyLocation::Header => {
                        if !has_header(headers, parameter_name) {
                            headers.push((parameter_name.clone(), "<API_KEY>".to_string()));
                        }
                    }
                    ApiKeyLocation::Query => {
                        if !query.iter().any(|(name, _)| name == parameter_name) {
                            query.push((parameter_name.clone(), "<API_KEY>".to_string()));
                        }
                    }
                    ApiKeyLocation::Cookie => {
                        headers.push((
                            "Cookie".to_string(),
                            format!("{}=<API_KEY>", parameter_name),
                        ));
                    }
                },
            }
        }
        basic_auth
    }

    fn base_url(&self, options: &CurlOptions) -> String {
        let base = match &options.base_url {
            Some(base_url) => base_url.clone(),
            None => self
                .spec
                .servers
                .first()
                .map(|server| server.resolved_url())
                .unwrap_or_else(|| FALLBACK_BASE_URL.to_string()),
        };
        let base = if base.starts_with('/') {
            format!("{}{}", FALLBACK_BASE_URL, base)
        } else {
            base
        };
        base.trim_end_matches('/').to_string()
    }

    fn expand_path(&self, endpoint: &Endpoint, options: &CurlOptions) -> String {
        let mut path = endpoint.path.clone();
        for parameter in endpoint.parameters_in(ParameterLocation::Path) {
            let value = options
                .path_params
                .get(&parameter.name)
                .cloned()
                .unwrap_or_else(|| self.parameter_value(parameter));
            path = path.replace(
                &format!("{{{}}}", parameter.name),
                &encode(&scalar_text(&value)),
            );
        }
        for (name, value) in &options.path_params {
            path = path.replace(&format!("{{{}}}", name), &encode(&scalar_text(value)));
        }
        path
    }

    /// Example, else a generated sample, else a `<name>` placeholder.
    fn parameter_value(&self, parameter: &Parameter) -> Value {
        if let Some(example) = &parameter.example {
            return example.clone();
        }
        match self.generator.generate(&parameter.schema) {
            Value::Null => Value::String(format!("<{}>", parameter.name)),
            sample => sample,
        }
    }

    /// First content type of the first declared success response.
    fn accept(&self, endpoint: &Endpoint) -> Option<String> {
        endpoint
            .responses
            .iter()
            .filter(|(status, _)| status.starts_with('2'))
            .find_map(|(_, response)| response.content.keys().next().cloned())
    }
}

fn push_query(query: &mut Vec<(String, String)>, name: &str, value: &Value) {
    match value {
        Value::Array(items) => {
            for item in items {
                query.push((name.to_string(), scalar_text(item)));
            }
        }
        other => query.push((name.to_string(), scalar_text(other))),
    }
}

fn body_arguments(content_type: &str, payload: &Value) -> Vec<String> {
    match (content_type, payload) {
        ("multipart/form-data", Value::Object(fields)) => fields
            .iter()
            .map(|(name, value)| {
                let field = format!("{}={}", name, scalar_text(value));
                format!("-F {}", shell_quote(&field))
            })
            .collect(),
        ("application/x-www-form-urlencoded", Value::Object(fields)) => {
            let pairs: Vec<String> = fields
                .iter()
                .map(|(name, value)| format!("{}={}", encode(name), encode(&scalar_text(value))))
                .collect();
            vec![format!("-d {}", shell_quote(&pairs.join("&")))]
        }
        (content_type, Value::String(text)) if !content_type.contains("json") => {
            vec![format!("-d {}", shell_quote(text))]
        }
        (_, payload) => vec![format!("-d {}", shell_quote(&payload.to_string()))],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::normalize;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn spec() -> ParsedSpec {
        let document = json!({
            "openapi": "3.0.3",
            "info": {"title": "Pets", "version": "1.0.0"},
            "servers": [{"url": "https://{region}.example.com/v1/", "variables": {"region": {"default": "eu"}}}],
            "security": [{"bearer": []}],
            "paths": {
                "/pets/{petId}": {
                    "parameters": [{"name": "petId", "in": "path", "schema": {"type": "integer"}, "example": 7}],
                    "get": {
                        "parameters": [
                            {"name": "fields", "in": "query", "required": true, "schema": {"type": "string", "example": "name,tag"}},
                            {"name": "verbose", "in": "query", "schema": {"type": "boolean"}},
                            {"name": "X-Trace", "in": "header", "required": true, "schema": {"type": "string"}}
                        ],
                        "responses": {"200": {"description": "ok", "content": {"application/json": {"schema": {"type": "object"}}}}}
                    },
                    "put": {
                        "security": [{"key": []}],
                        "requestBody": {
                            "content": {"application/json": {"schema": {
                                "type": "object",
                                "required": ["name"],
                                "properties": {"name": {"type": "string", "example": "O'Malley"}}
                            }}}
                        },
                        "responses": {"204": {"description": "updated"}}
                    },
                    "delete": {
                        "security": [{"basic": []}],
                        "responses": {"204": {"description": "gone"}}
                    }
                }
            },
            "components": {
                "securitySchemes": {
                    "bearer": {"type": "http", "scheme": "bearer"},
                    "basic": {"type": "http", "scheme": "basic"},
                    "key": {"type": "apiKey", "in": "query", "name": "api_key"}
                }
            }
        });
        normalize(&document, "memory://pets").unwrap()
    }

    #[test]
    fn test_get_fills_required_parameters_and_auth() {
        let spec = spec();
        let endpoint = spec.endpoint("/pets/{petId}", "get").unwrap();
        let command = CurlBuilder::new(&spec, SampleGenerator::default())
            .build(endpoint, &CurlOptions::default())
            .unwrap();
        assert_eq!(
            command,
            [
                "curl -X GET 'https://eu.example.com/v1/pets/7?fields=name%2Ctag'",
                "-H 'X-Trace: string'",
                "-H 'Accept: application/json'",
                "-H 'Authorization: Bearer <TOKEN>'",
            ]
            .join(LINE_CONTINUATION)
        );
    }

    #[test]
    fn test_caller_values_override() {
        let spec = spec();
        let endpoint = spec.endpoint("/pets/{petId}", "get").unwrap();
        let options = CurlOptions {
            base_url: Some("http://127.0.0.1:8080/".into()),
            path_params: IndexMap::from([("petId".to_string(), json!("a b"))]),
            query_params: IndexMap::from([("verbose".to_string(), json!(true))]),
            headers: IndexMap::from([("authorization".to_string(), "Bearer abc".to_string())]),
            ..CurlOptions::default()
        };
        let command = CurlBuilder::new(&spec, SampleGenerator::default())
            .build(endpoint, &options)
            .unwrap();
        assert!(command.starts_with(
            "curl -X GET 'http://127.0.0.1:8080/pets/a%20b?verbose=true&fields=name%2Ctag'"
        ));
        assert!(command.contains("-H 'authorization: Bearer abc'"));
        assert!(!command.contains("<TOKEN>"));
    }

    #[test]
    fn test_body_is_sampled_and_quoted() {
        let spec = spec();
        let endpoint = spec.endpoint("/pets/{petId}", "put").unwrap();
        let command = CurlBuilder::new(&spec, SampleGenerator::default())
            .build(endpoint, &CurlOptions::default())
            .unwrap();
        assert!(command.contains("?api_key=%3CAPI_KEY%3E'"));
        assert!(command.contains("-H 'Content-Type: application/json'"));
        assert!(command.ends_with(r#"-d '{"name":"O'\''Malley"}'"#));
    }

    #[test]
    fn test_basic_auth_and_body_rejection() {
        let spec = spec();
        let endpoint = spec.endpoint("/pets/{petId}", "delete").unwrap();
        let builder = CurlBuilder::new(&spec, SampleGenerator::default());
        let command = builder.build(endpoint, &CurlOptions::default()).unwrap();
        assert!(command.contains("-u '<USERNAME>:<PASSWORD>'"));
        assert!(!command.contains("-d "));

        let err = builder
            .build(
                endpoint,
                &CurlOptions {
                    body: Some(json!({"force": true})),
                    ..CurlOptions::default()
                },
            )
            .unwrap_err();
        assert_eq!(err.code(), "NO_REQUEST_BODY");
    }

    #[test]
    fn test_form_bodies() {
        assert_eq!(
            body_arguments("application/x-www-form-urlencoded", &json!({"a": "x y", "b": 2})),
            vec!["-d 'a=x%20y&b=2'".to_string()]
        );
        assert_eq!(
            body_arguments("multipart/form-data", &json!({"file": "<binary>"})),
            vec!["-F 'file=<binary>'".to_string()]
        );
        assert_eq!(
            body_arguments("text/plain", &json!("hello")),
            vec!["-d 'hello'".to_string()]
        );
    }
}
