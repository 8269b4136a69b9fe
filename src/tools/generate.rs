use crate::curl::{CurlBuilder, CurlOptions};
use crate::error::{Result, SpecError};
use crate::sample::SampleOptions;
use crate::service::SpecService;
use crate::typegen::{TypeEmitter, endpoint_type_name, type_name};
use crate::types::HttpMethod;
use crate::types::schema::JsonSchema;
use crate::validator::ValidationReport;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyTarget {
    #[default]
    Request,
    Response,
}

/// Names the schema a generation or validation call works on: either
/// `schemaName`, or `path` + `method` with an optional `target`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaTarget {
    pub schema_name: Option<String>,
    pub path: Option<String>,
    pub method: Option<String>,
    #[serde(default)]
    pub target: BodyTarget,
    pub status_code: Option<String>,
    pub content_type: Option<String>,
}

struct ResolvedSchema {
    schema: JsonSchema,
    /// Declaration name for emitted types.
    type_name: String,
    content_type: Option<String>,
}

impl SchemaTarget {
    fn resolve(&self, service: &SpecService) -> Result<ResolvedSchema> {
        if let Some(name) = &self.schema_name {
            return Ok(ResolvedSchema {
                schema: service.get_schema(name)?,
                type_name: type_name(name),
                content_type: None,
            });
        }
        let (Some(path), Some(method)) = (&self.path, &self.method) else {
            return Err(SpecError::invalid_input(
                "Provide either schemaName, or path and method",
            ));
        };
        let content_type = self.content_type.as_deref();
        let (schema, content_type, suffix) = match self.target {
            BodyTarget::Request => {
                let request = service.require_request_schema(path, method, content_type)?;
                (request.schema, request.content_type, "Request")
            }
            BodyTarget::Response => {
                let response = service.require_response_schema(
                    path,
                    method,
                    self.status_code.as_deref(),
                    content_type,
                )?;
                (response.schema, response.content_type, "Response")
            }
        };
        let method = HttpMethod::from_str(method).map_err(SpecError::invalid_input)?;
        Ok(ResolvedSchema {
            schema,
            type_name: endpoint_type_name(method, path, suffix),
            content_type: Some(content_type),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct ValidatePayloadParams {
    #[serde(flatten)]
    pub target: SchemaTarget,
    pub payload: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateSampleParams {
    #[serde(flatten)]
    pub target: SchemaTarget,
    pub include_optional: Option<bool>,
    pub max_depth: Option<usize>,
    pub max_array_items: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleResponse {
    pub sample: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateTypesParams {
    #[serde(flatten)]
    pub target: SchemaTarget,
    /// Overrides the derived declaration name.
    pub type_name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypesResponse {
    pub type_name: String,
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct GenerateCurlParams {
    pub path: String,
    pub method: String,
    #[serde(flatten)]
    pub options: CurlOptions,
}

#[derive(Debug, Serialize)]
pub struct CurlResponse {
    pub command: String,
}

pub fn validate_payload(
    service: &SpecService,
    params: ValidatePayloadParams,
) -> Result<ValidationReport> {
    let resolved = params.target.resolve(service)?;
    service.validate(&params.payload, &resolved.schema)
}

pub fn generate_sample(
    service: &SpecService,
    params: GenerateSampleParams,
) -> Result<SampleResponse> {
    let resolved = params.target.resolve(service)?;
    let defaults = &service.config().sample;
    let options = SampleOptions {
        include_optional: params.include_optional.unwrap_or(defaults.include_optional),
        max_depth: params.max_depth.unwrap_or(defaults.max_depth),
        max_array_items: params.max_array_items.or(defaults.max_array_items),
    };
    Ok(SampleResponse {
        sample: service.sample_generator(Some(options)).generate(&resolved.schema),
        content_type: resolved.content_type,
    })
}

pub fn generate_types(service: &SpecService, params: GenerateTypesParams) -> Result<TypesResponse> {
    let resolved = params.target.resolve(service)?;
    let declaration = params
        .type_name
        .as_deref()
        .map(type_name)
        .unwrap_or(resolved.type_name);
    let code = TypeEmitter::new(service.config().type_max_depth).emit(
        &resolved.schema,
        &declaration,
        true,
    );
    Ok(TypesResponse {
        type_name: declaration,
        code,
    })
}

pub fn generate_curl(service: &SpecService, params: GenerateCurlParams) -> Result<CurlResponse> {
    let spec = service.current()?;
    let endpoint = service.get_endpoint(&params.path, &params.method)?;
    let command = CurlBuilder::new(&spec, service.sample_generator(None))
        .with_default_content_type(service.config().default_content_type.clone())
        .build(&endpoint, &params.options)?;
    Ok(CurlResponse { command })
}
