//! Explore an OpenAPI 2.0 / 3.x document through a small set of query operations.
//!
//! A loaded document is normalized into a [`ParsedSpec`], held by a [`SpecService`], and
//! queried through the tool operations in [`tools`]: endpoint listing and lookup,
//! dereferenced request/response schemas, payload validation, sample generation and
//! client-facing artifacts (TypeScript-style types, cURL commands).

pub mod cache;
pub mod config;
pub mod curl;
pub mod dereference;
pub mod error;
pub mod loader;
pub mod normalizer;
pub mod sample;
pub mod service;
pub mod tools;
pub mod typegen;
pub mod types;
pub mod validator;

pub use crate::cache::SpecCache;
pub use crate::config::ExplorerConfig;
pub use crate::error::{Result, SpecError};
pub use crate::loader::{DefaultLoader, LoadOptions, LoadedDocument, SpecLoader, SpecSource};
pub use crate::normalizer::normalize;
pub use crate::sample::{SampleGenerator, SampleOptions};
pub use crate::service::SpecService;
pub use crate::typegen::TypeEmitter;
pub use crate::types::schema::JsonSchema;
pub use crate::types::{Endpoint, ParsedSpec, endpoint_key};
pub use crate::validator::{PayloadValidator, ValidationIssue, ValidationReport};

const OPENAPI_FIELD: &str = "openapi";
const SWAGGER_FIELD: &str = "swagger";
const INFO_FIELD: &str = "info";
const PATHS_FIELD: &str = "paths";
const PARAMETERS_FIELD: &str = "parameters";
const REQUEST_BODY_FIELD: &str = "requestBody";
const RESPONSES_FIELD: &str = "responses";
const CONTENT_FIELD: &str = "content";
const SCHEMA_FIELD: &str = "schema";
const SECURITY_FIELD: &str = "security";
const NAME_FIELD: &str = "name";
const IN_FIELD: &str = "in";
const REQUIRED_FIELD: &str = "required";
const DESCRIPTION_FIELD: &str = "description";
const EXAMPLE_FIELD: &str = "example";
const EXAMPLES_FIELD: &str = "examples";
const REF_FIELD: &str = "$ref";
const PATH_SEPARATOR: &str = "/";
const DEFAULT_CONTENT_TYPE: &str = "application/json";
