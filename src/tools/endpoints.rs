use crate::error::{Result, SpecError};
use crate::service::{EndpointFilter, EndpointPage, RequestSchema, ResponseSchema, SpecService};
use crate::tools::spec::NoParams;
use crate::types::Endpoint;
use crate::types::schema::JsonSchema;
use serde::{Deserialize, Serialize};

const DEFAULT_SEARCH_LIMIT: usize = 20;

#[derive(Debug, Deserialize)]
pub struct EndpointParams {
    pub path: String,
    pub method: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    pub query: String,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestSchemaParams {
    pub path: String,
    pub method: String,
    pub content_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseSchemaParams {
    pub path: String,
    pub method: String,
    pub status_code: Option<String>,
    pub content_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaParams {
    pub schema_name: String,
}

#[derive(Debug, Serialize)]
pub struct SchemaListResponse {
    pub schemas: Vec<String>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct NamedSchema {
    pub name: String,
    pub schema: JsonSchema,
}

pub fn list_endpoints(service: &SpecService, params: EndpointFilter) -> Result<EndpointPage> {
    service.list_endpoints(&params)
}

pub fn search_endpoints(service: &SpecService, params: SearchParams) -> Result<EndpointPage> {
    let query = params.query.trim();
    if query.is_empty() {
        return Err(SpecError::invalid_input("query must not be empty"));
    }
    service.list_endpoints(&EndpointFilter {
        search: Some(query.to_string()),
        limit: Some(params.limit.unwrap_or(DEFAULT_SEARCH_LIMIT)),
        ..EndpointFilter::default()
    })
}

pub fn get_endpoint(service: &SpecService, params: EndpointParams) -> Result<Endpoint> {
    service.get_endpoint(&params.path, &params.method)
}

pub fn get_request_schema(
    service: &SpecService,
    params: RequestSchemaParams,
) -> Result<Option<RequestSchema>> {
    service.get_request_schema(&params.path, &params.method, params.content_type.as_deref())
}

pub fn get_response_schema(
    service: &SpecService,
    params: ResponseSchemaParams,
) -> Result<Option<ResponseSchema>> {
    service.get_response_schema(
        &params.path,
        &params.method,
        params.status_code.as_deref(),
        params.content_type.as_deref(),
    )
}

pub fn list_schemas(service: &SpecService, _params: NoParams) -> Result<SchemaListResponse> {
    let schemas = service.schema_names()?;
    Ok(SchemaListResponse {
        count: schemas.len(),
        schemas,
    })
}

pub fn get_schema(service: &SpecService, params: SchemaParams) -> Result<NamedSchema> {
    let schema = service.get_schema(&params.schema_name)?;
    Ok(NamedSchema {
        name: params.schema_name,
        schema,
    })
}
