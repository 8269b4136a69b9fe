use serde_json::{Map, Value, json};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SpecError>;

/// Every failure a core operation can surface.
///
/// Messages are final and user-presentable; the tool boundary copies them into the
/// response envelope unchanged. Identifiers are repeated in [`SpecError::context`] so
/// callers do not need to parse the message.
#[derive(Debug, Error)]
pub enum SpecError {
    #[error("No OpenAPI specification is loaded. Load one with load_spec first.")]
    SpecNotLoaded,

    #[error("Endpoint not found: {} {path}", .method.to_uppercase())]
    EndpointNotFound { path: String, method: String },

    #[error("Schema not found: {name}")]
    SchemaNotFound { name: String },

    #[error("Endpoint {} {path} has no request body", .method.to_uppercase())]
    NoRequestBody { path: String, method: String },

    #[error("Failed to load specification from {source_id}: {message}")]
    SpecLoadError {
        message: String,
        source_id: String,
        context: Map<String, Value>,
    },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Schema could not be compiled for validation: {message}")]
    ValidationFailed { message: String },
}

impl SpecError {
    pub(crate) fn endpoint_not_found(path: impl Into<String>, method: impl Into<String>) -> Self {
        Self::EndpointNotFound {
            path: path.into(),
            method: method.into(),
        }
    }

    pub(crate) fn schema_not_found(name: impl Into<String>) -> Self {
        Self::SchemaNotFound { name: name.into() }
    }

    pub(crate) fn no_request_body(path: impl Into<String>, method: impl Into<String>) -> Self {
        Self::NoRequestBody {
            path: path.into(),
            method: method.into(),
        }
    }

    pub(crate) fn load_error(message: impl Into<String>, source_id: impl Into<String>) -> Self {
        Self::SpecLoadError {
            message: message.into(),
            source_id: source_id.into(),
            context: Map::new(),
        }
    }

    /// Attaches one more diagnostic entry to a [`SpecError::SpecLoadError`]; no-op otherwise.
    pub(crate) fn with_load_context(mut self, key: &str, value: impl Into<Value>) -> Self {
        if let SpecError::SpecLoadError { context, .. } = &mut self {
            context.insert(key.to_string(), value.into());
        }
        self
    }

    pub(crate) fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub(crate) fn validation_failed(message: impl Into<String>) -> Self {
        Self::ValidationFailed {
            message: message.into(),
        }
    }

    /// Stable result code reported next to the message.
    pub fn code(&self) -> &'static str {
        match self {
            SpecError::SpecNotLoaded => "SPEC_NOT_LOADED",
            SpecError::EndpointNotFound { .. } => "ENDPOINT_NOT_FOUND",
            SpecError::SchemaNotFound { .. } => "SCHEMA_NOT_FOUND",
            SpecError::NoRequestBody { .. } => "NO_REQUEST_BODY",
            SpecError::SpecLoadError { .. } => "SPEC_LOAD_ERROR",
            SpecError::InvalidInput { .. } => "INVALID_INPUT",
            SpecError::ValidationFailed { .. } => "VALIDATION_FAILED",
        }
    }

    /// Diagnostic identifiers for the failure, if it carries any.
    pub fn context(&self) -> Option<Value> {
        match self {
            SpecError::SpecNotLoaded
            | SpecError::InvalidInput { .. }
            | SpecError::ValidationFailed { .. } => None,
            SpecError::EndpointNotFound { path, method }
            | SpecError::NoRequestBody { path, method } => Some(json!({
                "path": path,
                "method": method,
            })),
            SpecError::SchemaNotFound { name } => Some(json!({ "schemaName": name })),
            SpecError::SpecLoadError {
                source_id, context, ..
            } => {
                let mut context = context.clone();
                context
                    .entry("source")
                    .or_insert_with(|| Value::String(source_id.clone()));
                Some(Value::Object(context))
            }
        }
    }
}
