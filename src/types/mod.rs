pub mod json_pointer;
pub mod schema;
pub mod version;

use crate::types::schema::JsonSchema;
use crate::types::version::SpecVersion;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// The eight operation keys a path item may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    Get,
    Put,
    Post,
    Delete,
    Options,
    Head,
    Patch,
    Trace,
}

impl HttpMethod {
    pub const ALL: [HttpMethod; 8] = [
        HttpMethod::Get,
        HttpMethod::Put,
        HttpMethod::Post,
        HttpMethod::Delete,
        HttpMethod::Options,
        HttpMethod::Head,
        HttpMethod::Patch,
        HttpMethod::Trace,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "get",
            HttpMethod::Put => "put",
            HttpMethod::Post => "post",
            HttpMethod::Delete => "delete",
            HttpMethod::Options => "options",
            HttpMethod::Head => "head",
            HttpMethod::Patch => "patch",
            HttpMethod::Trace => "trace",
        }
    }
}

impl Display for HttpMethod {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.to_ascii_lowercase();
        HttpMethod::ALL
            .into_iter()
            .find(|method| method.as_str() == lowered)
            .ok_or_else(|| format!("Unsupported HTTP method: {}", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    Cookie,
}

impl Display for ParameterLocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let str = String::from(match self {
            ParameterLocation::Header => "header",
            ParameterLocation::Query => "query",
            ParameterLocation::Cookie => "cookie",
            ParameterLocation::Path => "path",
        });
        write!(f, "{}", str)
    }
}

impl FromStr for ParameterLocation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "path" => Ok(ParameterLocation::Path),
            "query" => Ok(ParameterLocation::Query),
            "header" => Ok(ParameterLocation::Header),
            "cookie" => Ok(ParameterLocation::Cookie),
            other => Err(format!("Unsupported parameter location: {}", other)),
        }
    }
}

/// Leading-slash form of a path template; `users` and `/users` are the same path.
pub fn normalize_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}

/// Index key of an endpoint: `"<method> </path>"`, method lowercase.
pub fn endpoint_key(method: &str, path: &str) -> String {
    format!("{} {}", method.to_ascii_lowercase(), normalize_path(path))
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SpecInfo {
    pub title: String,
    pub description: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerVariable {
    pub default: String,
    #[serde(rename = "enum", skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Server {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub variables: IndexMap<String, ServerVariable>,
}

impl Server {
    /// URL with every `{variable}` replaced by its default.
    pub fn resolved_url(&self) -> String {
        self.variables
            .iter()
            .fold(self.url.clone(), |url, (name, variable)| {
                url.replace(&format!("{{{}}}", name), &variable.default)
            })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TagInfo {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "in")]
    pub location: ParameterLocation,
    pub required: bool,
    pub deprecated: bool,
    pub schema: JsonSchema,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example: Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MediaType {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<JsonSchema>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example: Option<Value>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub examples: IndexMap<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RequestBody {
    pub description: String,
    pub required: bool,
    pub content: IndexMap<String, MediaType>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ResponseDefinition {
    pub description: String,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub content: IndexMap<String, MediaType>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub headers: IndexMap<String, JsonSchema>,
}

/// One security requirement alternative: scheme name to required scopes.
pub type SecurityRequirement = IndexMap<String, Vec<String>>;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthFlow {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_url: Option<String>,
    pub scopes: IndexMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiKeyLocation {
    Query,
    Header,
    Cookie,
}

/// Shape of a security scheme, keyed by its `type`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum SecuritySchemeKind {
    #[serde(rename = "apiKey")]
    ApiKey {
        #[serde(rename = "in")]
        location: ApiKeyLocation,
        #[serde(rename = "name")]
        parameter_name: String,
    },
    #[serde(rename = "http")]
    Http {
        scheme: String,
        #[serde(rename = "bearerFormat", skip_serializing_if = "Option::is_none")]
        bearer_format: Option<String>,
    },
    #[serde(rename = "oauth2")]
    OAuth2 { flows: IndexMap<String, OAuthFlow> },
    #[serde(rename = "openIdConnect")]
    OpenIdConnect {
        #[serde(rename = "openIdConnectUrl")]
        open_id_connect_url: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct SecurityScheme {
    #[serde(rename = "schemeName")]
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub kind: SecuritySchemeKind,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    pub path: String,
    pub method: HttpMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    pub summary: String,
    pub description: String,
    pub tags: Vec<String>,
    pub deprecated: bool,
    pub parameters: Vec<Parameter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_body: Option<RequestBody>,
    pub responses: IndexMap<String, ResponseDefinition>,
    pub security: Vec<SecurityRequirement>,
}

impl Endpoint {
    pub fn key(&self) -> String {
        endpoint_key(self.method.as_str(), &self.path)
    }

    pub fn parameters_in(
        &self,
        location: ParameterLocation,
    ) -> impl Iterator<Item = &Parameter> + '_ {
        self.parameters
            .iter()
            .filter(move |parameter| parameter.location == location)
    }
}

/// The normalized form of one loaded document.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedSpec {
    pub spec_version: SpecVersion,
    pub info: SpecInfo,
    pub servers: Vec<Server>,
    pub tags: Vec<TagInfo>,
    pub endpoints: IndexMap<String, Endpoint>,
    pub schemas: IndexMap<String, JsonSchema>,
    pub security_schemes: Vec<SecurityScheme>,
    pub security: Vec<SecurityRequirement>,
    pub loaded_at: DateTime<Utc>,
    pub source: String,
}

impl ParsedSpec {
    pub fn endpoint(&self, path: &str, method: &str) -> Option<&Endpoint> {
        self.endpoints.get(&endpoint_key(method, path))
    }

    pub fn security_scheme(&self, name: &str) -> Option<&SecurityScheme> {
        self.security_schemes
            .iter()
            .find(|scheme| scheme.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_key_normalizes_method_and_path() {
        assert_eq!(endpoint_key("GET", "users"), "get /users");
        assert_eq!(endpoint_key("get", "/users"), "get /users");
        assert_eq!(endpoint_key("Post", "/users/{id}"), "post /users/{id}");
    }

    #[test]
    fn test_http_method_from_str() {
        assert_eq!(HttpMethod::from_str("DELETE").unwrap(), HttpMethod::Delete);
        assert_eq!(HttpMethod::from_str("trace").unwrap(), HttpMethod::Trace);
        assert!(HttpMethod::from_str("connect").is_err());
        assert!(HttpMethod::from_str("x-internal").is_err());
    }

    #[test]
    fn test_server_resolved_url() {
        let mut variables = IndexMap::new();
        variables.insert(
            "region".to_string(),
            ServerVariable {
                default: "eu".to_string(),
                enum_values: vec!["eu".to_string(), "us".to_string()],
                description: None,
            },
        );
        let server = Server {
            url: "https://{region}.api.example.com/v1".to_string(),
            description: None,
            variables,
        };
        assert_eq!(server.resolved_url(), "https://eu.api.example.com/v1");
    }

    #[test]
    fn test_security_scheme_serializes_only_relevant_fields() {
        let scheme = SecurityScheme {
            name: "bearerAuth".to_string(),
            description: None,
            kind: SecuritySchemeKind::Http {
                scheme: "bearer".to_string(),
                bearer_format: Some("JWT".to_string()),
            },
        };
        let value = serde_json::to_value(&scheme).unwrap();
        assert_eq!(value["type"], "http");
        assert_eq!(value["bearerFormat"], "JWT");
        assert!(value.get("flows").is_none());
        assert!(value.get("in").is_none());
    }
}
