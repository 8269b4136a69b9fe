pub mod endpoints;
pub mod generate;
pub mod spec;

use crate::error::{Result, SpecError};
use crate::service::SpecService;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Uniform result envelope of every tool call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
}

impl ToolResponse {
    pub fn ok(data: Value) -> Self {
        ToolResponse {
            success: true,
            data: Some(data),
            error: None,
            code: None,
            context: None,
        }
    }

    /// Copies the error's message, code and context unchanged.
    pub fn failure(error: &SpecError) -> Self {
        ToolResponse {
            success: false,
            data: None,
            error: Some(error.to_string()),
            code: Some(error.code().to_string()),
            context: error.context(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
}

pub const TOOLS: &[ToolDescriptor] = &[
    ToolDescriptor {
        name: "load_spec",
        description: "Load an OpenAPI 2.0/3.x document from `url` or `filePath` and make it active.",
    },
    ToolDescriptor {
        name: "get_spec_info",
        description: "Summarize the active spec: info, servers, tags, security schemes and counts.",
    },
    ToolDescriptor {
        name: "clear_spec",
        description: "Drop the active spec and its cache entry.",
    },
    ToolDescriptor {
        name: "list_endpoints",
        description: "List endpoints filtered by tag, method, deprecated or search text, with limit/offset.",
    },
    ToolDescriptor {
        name: "search_endpoints",
        description: "Free-text search over path, summary, description, operationId and tags.",
    },
    ToolDescriptor {
        name: "get_endpoint",
        description: "Full detail of one endpoint by `path` and `method`.",
    },
    ToolDescriptor {
        name: "get_request_schema",
        description: "Dereferenced request body schema of an endpoint, optionally for a `contentType`.",
    },
    ToolDescriptor {
        name: "get_response_schema",
        description: "Dereferenced response schema for a `statusCode` (exact, then 2XX-style, then default).",
    },
    ToolDescriptor {
        name: "list_schemas",
        description: "Names of the spec's named schemas.",
    },
    ToolDescriptor {
        name: "get_schema",
        description: "One named schema by `schemaName`.",
    },
    ToolDescriptor {
        name: "validate_payload",
        description: "Validate `payload` against a named schema or an endpoint request/response body.",
    },
    ToolDescriptor {
        name: "generate_sample",
        description: "Generate a deterministic example for a named schema or an endpoint body.",
    },
    ToolDescriptor {
        name: "generate_types",
        description: "Emit TypeScript declarations for a named schema or an endpoint body.",
    },
    ToolDescriptor {
        name: "generate_curl",
        description: "Render a cURL command for an endpoint with sampled parameters and body.",
    },
];

/// Runs one tool by name and wraps the outcome in a [`ToolResponse`].
pub fn call_tool(service: &SpecService, name: &str, arguments: Value) -> ToolResponse {
    match dispatch(service, name, arguments) {
        Ok(data) => ToolResponse::ok(data),
        Err(e) => {
            log::debug!("Tool {} failed with {}: {}", name, e.code(), e);
            ToolResponse::failure(&e)
        }
    }
}

fn dispatch(service: &SpecService, name: &str, arguments: Value) -> Result<Value> {
    match name {
        "load_spec" => run(service, arguments, spec::load_spec),
        "get_spec_info" => run(service, arguments, spec::get_spec_info),
        "clear_spec" => run(service, arguments, spec::clear_spec),
        "list_endpoints" => run(service, arguments, endpoints::list_endpoints),
        "search_endpoints" => run(service, arguments, endpoints::search_endpoints),
        "get_endpoint" => run(service, arguments, endpoints::get_endpoint),
        "get_request_schema" => run(service, arguments, endpoints::get_request_schema),
        "get_response_schema" => run(service, arguments, endpoints::get_response_schema),
        "list_schemas" => run(service, arguments, endpoints::list_schemas),
        "get_schema" => run(service, arguments, endpoints::get_schema),
        "validate_payload" => run(service, arguments, generate::validate_payload),
        "generate_sample" => run(service, arguments, generate::generate_sample),
        "generate_types" => run(service, arguments, generate::generate_types),
        "generate_curl" => run(service, arguments, generate::generate_curl),
        other => Err(SpecError::invalid_input(format!("Unknown tool: {}", other))),
    }
}

fn run<P, R>(
    service: &SpecService,
    arguments: Value,
    handler: fn(&SpecService, P) -> Result<R>,
) -> Result<Value>
where
    P: DeserializeOwned,
    R: Serialize,
{
    let arguments = match arguments {
        Value::Null => Value::Object(Map::new()),
        other => other,
    };
    let params: P = serde_json::from_value(arguments)
        .map_err(|e| SpecError::invalid_input(format!("Invalid arguments: {}", e)))?;
    let result = handler(service, params)?;
    serde_json::to_value(result)
        .map_err(|e| SpecError::invalid_input(format!("Result could not be encoded: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExplorerConfig;
    use crate::loader::StaticLoader;
    use serde_json::json;

    fn service() -> SpecService {
        SpecService::with_loader(ExplorerConfig::default(), StaticLoader::new())
    }

    #[test]
    fn test_unknown_tool() {
        let response = call_tool(&service(), "drop_tables", json!({}));
        assert!(!response.success);
        assert_eq!(response.code.as_deref(), Some("INVALID_INPUT"));
        assert_eq!(response.error.as_deref(), Some("Invalid input: Unknown tool: drop_tables"));
    }

    #[test]
    fn test_bad_arguments_are_invalid_input() {
        let response = call_tool(&service(), "get_endpoint", json!({"path": 5}));
        assert_eq!(response.code.as_deref(), Some("INVALID_INPUT"));
    }

    #[test]
    fn test_failure_envelope_serialization() {
        let response = call_tool(&service(), "list_schemas", Value::Null);
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({
                "success": false,
                "error": "No OpenAPI specification is loaded. Load one with load_spec first.",
                "code": "SPEC_NOT_LOADED"
            })
        );
    }

    #[test]
    fn test_every_listed_tool_is_dispatched() {
        let service = service();
        for tool in TOOLS {
            let response = call_tool(&service, tool.name, json!({}));
            assert_ne!(
                response.error.as_deref(),
                Some(format!("Invalid input: Unknown tool: {}", tool.name).as_str())
            );
        }
    }
}
