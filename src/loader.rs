use crate::dereference::Dereferencer;
use crate::error::{Result, SpecError};
use crate::{INFO_FIELD, OPENAPI_FIELD, PATHS_FIELD, SWAGGER_FIELD};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Where a specification comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecSource {
    File(PathBuf),
    Url(String),
}

impl SpecSource {
    /// The identifier recorded as the spec's `source` and used for cache matching.
    pub fn id(&self) -> String {
        match self {
            SpecSource::File(path) => path.display().to_string(),
            SpecSource::Url(url) => url.clone(),
        }
    }
}

/// Caller-facing load request: exactly one of `url` / `file_path`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadOptions {
    pub url: Option<String>,
    pub file_path: Option<String>,
}

impl LoadOptions {
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            url: None,
            file_path: Some(path.into()),
        }
    }

    pub fn url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            file_path: None,
        }
    }

    pub fn source(&self) -> Result<SpecSource> {
        match (&self.url, &self.file_path) {
            (Some(url), None) => Ok(SpecSource::Url(url.clone())),
            (None, Some(path)) => Ok(SpecSource::File(PathBuf::from(path))),
            (Some(_), Some(_)) => Err(SpecError::invalid_input(
                "Provide either url or filePath, not both",
            )),
            (None, None) => Err(SpecError::invalid_input(
                "Either url or filePath is required",
            )),
        }
    }
}

/// A parsed, reference-free document plus the origin it was read from.
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    pub document: Value,
    pub source: String,
}

/// Produces reference-free documents for the spec service.
pub trait SpecLoader: Send + Sync {
    fn load(&self, source: &SpecSource) -> Result<LoadedDocument>;
}

/// Reads files (JSON or YAML) and, with the `remote` feature, fetches URLs.
#[derive(Debug, Default, Clone)]
pub struct DefaultLoader;

impl DefaultLoader {
    pub fn new() -> Self {
        DefaultLoader
    }

    fn read_file(path: &Path) -> Result<String> {
        let source_id = path.display().to_string();
        std::fs::read_to_string(path).map_err(|e| {
            SpecError::load_error(format!("Unable to read file: {}", e), &source_id)
                .with_load_context("filePath", source_id.clone())
        })
    }

    #[cfg(feature = "remote")]
    fn fetch(url: &str) -> Result<String> {
        let response = reqwest::blocking::get(url).map_err(|e| {
            SpecError::load_error(format!("Request failed: {}", e), url)
                .with_load_context("url", url)
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(SpecError::load_error(format!("HTTP {}", status), url)
                .with_load_context("url", url)
                .with_load_context("status", status.as_u16()));
        }
        response.text().map_err(|e| {
            SpecError::load_error(format!("Unable to read response body: {}", e), url)
                .with_load_context("url", url)
        })
    }

    #[cfg(not(feature = "remote"))]
    fn fetch(url: &str) -> Result<String> {
        Err(SpecError::load_error(
            "Loading from a URL requires the `remote` feature",
            url,
        )
        .with_load_context("url", url))
    }
}

impl SpecLoader for DefaultLoader {
    fn load(&self, source: &SpecSource) -> Result<LoadedDocument> {
        let source_id = source.id();
        let (content, yaml_hint) = match source {
            SpecSource::File(path) => (Self::read_file(path)?, has_yaml_extension(&source_id)),
            SpecSource::Url(url) => (Self::fetch(url)?, has_yaml_extension(url)),
        };
        let raw = parse_document(&content, yaml_hint, &source_id)?;
        prepare_document(raw, source_id)
    }
}

/// Serves documents that are already in memory, keyed by source id.
#[derive(Debug, Default, Clone)]
pub struct StaticLoader {
    documents: Vec<(SpecSource, Value)>,
}

impl StaticLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, source: SpecSource, document: Value) -> Self {
        self.documents.push((source, document));
        self
    }
}

impl SpecLoader for StaticLoader {
    fn load(&self, source: &SpecSource) -> Result<LoadedDocument> {
        let document = self
            .documents
            .iter()
            .find(|(known, _)| known == source)
            .map(|(_, document)| document.clone())
            .ok_or_else(|| SpecError::load_error("No document registered", source.id()))?;
        prepare_document(document, source.id())
    }
}

fn has_yaml_extension(source: &str) -> bool {
    let lowered = source.to_ascii_lowercase();
    lowered.ends_with(".yaml") || lowered.ends_with(".yml")
}

/// Parses JSON, or YAML when hinted by the extension; without a hint JSON is tried first.
pub fn parse_document(content: &str, yaml_hint: bool, source_id: &str) -> Result<Value> {
    let parsed = if yaml_hint {
        serde_yaml::from_str::<Value>(content).map_err(|e| e.to_string())
    } else {
        serde_json::from_str::<Value>(content)
            .or_else(|_| serde_yaml::from_str::<Value>(content))
            .map_err(|e| e.to_string())
    };
    parsed.map_err(|e| SpecError::load_error(format!("Unable to parse document: {}", e), source_id))
}

/// Structural checks, then `$ref` resolution.
pub fn prepare_document(mut raw: Value, source_id: String) -> Result<LoadedDocument> {
    quote_version_numbers(&mut raw);
    check_structure(&raw, &source_id)?;
    let document = Dereferencer::new(&raw).dereference();
    Ok(LoadedDocument {
        document,
        source: source_id,
    })
}

/// Unquoted YAML such as `swagger: 2.0` parses as a number; turn it back into text.
fn quote_version_numbers(raw: &mut Value) {
    let Some(root) = raw.as_object_mut() else {
        return;
    };
    quote_number(root, SWAGGER_FIELD);
    quote_number(root, OPENAPI_FIELD);
    if let Some(Value::Object(info)) = root.get_mut(INFO_FIELD) {
        quote_number(info, "version");
    }
}

fn quote_number(object: &mut Map<String, Value>, field: &str) {
    if let Some(Value::Number(number)) = object.get(field) {
        let text = number.to_string();
        object.insert(field.to_string(), Value::String(text));
    }
}

fn check_structure(raw: &Value, source_id: &str) -> Result<()> {
    let Some(root) = raw.as_object() else {
        return Err(SpecError::load_error(
            "Document root must be an object",
            source_id,
        ));
    };

    let swagger = root.get(SWAGGER_FIELD).and_then(Value::as_str);
    let openapi = root.get(OPENAPI_FIELD).and_then(Value::as_str);
    match (swagger, openapi) {
        (Some(version), _) if version.starts_with("2.") => {}
        (_, Some(version)) if version.starts_with("3.") => {}
        (None, None) => {
            return Err(SpecError::load_error(
                "Document declares neither a 'swagger' nor an 'openapi' version",
                source_id,
            ));
        }
        (swagger, openapi) => {
            return Err(SpecError::load_error(
                format!(
                    "Unsupported specification version: {}",
                    swagger.or(openapi).unwrap_or_default()
                ),
                source_id,
            ));
        }
    }

    if !root.get(INFO_FIELD).is_some_and(Value::is_object) {
        return Err(SpecError::load_error(
            "Document is missing the 'info' object",
            source_id,
        ));
    }
    if !root.get(PATHS_FIELD).is_some_and(Value::is_object) {
        return Err(SpecError::load_error(
            "Document is missing the 'paths' object",
            source_id,
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn minimal_v3() -> Value {
        json!({
            "openapi": "3.0.3",
            "info": {"title": "Pets", "version": "1.0.0"},
            "paths": {
                "/pets": {
                    "get": {
                        "responses": {
                            "200": {
                                "description": "ok",
                                "content": {
                                    "application/json": {
                                        "schema": {"$ref": "#/components/schemas/Pet"}
                                    }
                                }
                            }
                        }
                    }
                }
            },
            "components": {"schemas": {"Pet": {"type": "object"}}}
        })
    }

    #[test]
    fn test_load_options_source() {
        assert_eq!(
            LoadOptions::file("spec.json").source().unwrap(),
            SpecSource::File(PathBuf::from("spec.json"))
        );
        let both = LoadOptions {
            url: Some("https://x".into()),
            file_path: Some("spec.json".into()),
        };
        assert_eq!(both.source().unwrap_err().code(), "INVALID_INPUT");
        assert_eq!(
            LoadOptions::default().source().unwrap_err().code(),
            "INVALID_INPUT"
        );
    }

    #[test]
    fn test_load_json_file_is_dereferenced() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, "{}", minimal_v3()).unwrap();
        let loaded = DefaultLoader::new()
            .load(&SpecSource::File(file.path().to_path_buf()))
            .unwrap();
        assert_eq!(loaded.source, file.path().display().to_string());
        assert!(!crate::dereference::contains_reference(&loaded.document));
    }

    #[test]
    fn test_load_yaml_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        write!(
            file,
            "swagger: \"2.0\"\ninfo:\n  title: Pets\n  version: \"1\"\npaths: {{}}\n"
        )
        .unwrap();
        let loaded = DefaultLoader::new()
            .load(&SpecSource::File(file.path().to_path_buf()))
            .unwrap();
        assert_eq!(loaded.document["swagger"], "2.0");
    }

    #[test]
    fn test_load_yaml_file_with_unquoted_version() {
        let mut file = tempfile::Builder::new().suffix(".yml").tempfile().unwrap();
        write!(
            file,
            "swagger: 2.0\ninfo:\n  title: Pets\n  version: 1.0\npaths: {{}}\n"
        )
        .unwrap();
        let loaded = DefaultLoader::new()
            .load(&SpecSource::File(file.path().to_path_buf()))
            .unwrap();
        assert_eq!(loaded.document["swagger"], "2.0");
        assert_eq!(loaded.document["info"]["version"], "1.0");
    }

    #[test]
    fn test_missing_file_reports_file_path() {
        let err = DefaultLoader::new()
            .load(&SpecSource::File(PathBuf::from("/definitely/not/here.json")))
            .unwrap_err();
        assert_eq!(err.code(), "SPEC_LOAD_ERROR");
        assert_eq!(
            err.context().unwrap()["filePath"],
            "/definitely/not/here.json"
        );
    }

    #[test]
    fn test_structure_checks() {
        let no_version = json!({"info": {}, "paths": {}});
        assert!(prepare_document(no_version, "x".into()).is_err());

        let old = json!({"swagger": "1.2", "info": {}, "paths": {}});
        let err = prepare_document(old, "x".into()).unwrap_err();
        assert!(err.to_string().contains("1.2"));

        let no_paths = json!({"openapi": "3.1.0", "info": {}});
        let err = prepare_document(no_paths, "x".into()).unwrap_err();
        assert!(err.to_string().contains("paths"));

        assert!(prepare_document(minimal_v3(), "x".into()).is_ok());
    }

    #[test]
    fn test_static_loader() {
        let source = SpecSource::Url("memory://pets".into());
        let loader = StaticLoader::new().with_document(source.clone(), minimal_v3());
        assert!(loader.load(&source).is_ok());
        assert!(
            loader
                .load(&SpecSource::Url("memory://other".into()))
                .is_err()
        );
    }
}
