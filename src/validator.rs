use crate::error::{Result, SpecError};
use crate::types::schema::JsonSchema;
use dashmap::DashMap;
use jsonschema::error::ValidationErrorKind;
use jsonschema::{Draft, ValidationError, Validator as JsonValidator};
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::sync::Arc;

/// One normalized schema violation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationIssue {
    /// JSON pointer into the payload; empty for the root.
    pub path: String,
    pub message: String,
    /// The schema keyword that failed, e.g. `format` or `required`.
    pub keyword: String,
    pub params: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<ValidationIssue>,
}

/// Compiles schemas with `jsonschema` and keeps one compiled validator per distinct schema.
#[derive(Default)]
pub struct PayloadValidator {
    validators: DashMap<String, Arc<JsonValidator>>,
}

impl PayloadValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates `payload`, collecting every violation.
    pub fn validate(
        &self,
        payload: &Value,
        schema: &JsonSchema,
        draft: Draft,
    ) -> Result<ValidationReport> {
        self.validate_value(payload, &schema.to_value(), draft)
    }

    pub fn validate_value(
        &self,
        payload: &Value,
        schema: &Value,
        draft: Draft,
    ) -> Result<ValidationReport> {
        let validator = self.compiled(schema, draft)?;
        let errors: Vec<ValidationIssue> = validator.iter_errors(payload).map(to_issue).collect();
        Ok(ValidationReport {
            valid: errors.is_empty(),
            errors,
        })
    }

    pub fn clear(&self) {
        self.validators.clear();
    }

    fn compiled(&self, schema: &Value, draft: Draft) -> Result<Arc<JsonValidator>> {
        let schema = rewrite_nullable(schema);
        let key = format!("{:?}|{}", draft, canonical(&schema));
        if let Some(validator) = self.validators.get(&key) {
            return Ok(Arc::clone(validator.value()));
        }

        let validator = JsonValidator::options()
            .with_draft(draft)
            .should_validate_formats(true)
            .build(&schema)
            .map_err(|e| SpecError::validation_failed(e.to_string()))?;
        let validator = Arc::new(validator);
        self.validators.insert(key, Arc::clone(&validator));
        log::debug!("Compiled validator #{}", self.validators.len());
        Ok(validator)
    }
}

/// Serialization with object keys sorted at every level.
fn canonical(value: &Value) -> String {
    fn sorted(value: &Value) -> Value {
        match value {
            Value::Object(object) => {
                let mut keys: Vec<&String> = object.keys().collect();
                keys.sort();
                let mut result = Map::with_capacity(object.len());
                for key in keys {
                    result.insert(key.clone(), sorted(&object[key]));
                }
                Value::Object(result)
            }
            Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
            other => other.clone(),
        }
    }
    sorted(value).to_string()
}

/// Rewrites `nullable: true` into a type union with `"null"` (and adds `null` to any `enum`).
fn rewrite_nullable(value: &Value) -> Value {
    match value {
        Value::Object(object) => {
            let mut result: Map<String, Value> = object
                .iter()
                .filter(|(key, _)| key.as_str() != "nullable")
                .map(|(key, child)| (key.clone(), rewrite_nullable(child)))
                .collect();
            if object.get("nullable").and_then(Value::as_bool) == Some(true) {
                match result.get_mut("type") {
                    Some(type_value) if type_value.is_string() => {
                        let name = type_value.take();
                        *type_value = json!([name, "null"]);
                    }
                    Some(Value::Array(names)) if !names.contains(&json!("null")) => {
                        names.push(json!("null"));
                    }
                    _ => {}
                }
                if let Some(Value::Array(options)) = result.get_mut("enum") {
                    if !options.contains(&Value::Null) {
                        options.push(Value::Null);
                    }
                }
            }
            Value::Object(result)
        }
        Value::Array(items) => Value::Array(items.iter().map(rewrite_nullable).collect()),
        other => other.clone(),
    }
}

fn to_issue(error: ValidationError<'_>) -> ValidationIssue {
    let schema_path = error.schema_path.to_string();
    let keyword = schema_path
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string();
    let mut params = Map::new();
    match &error.kind {
        ValidationErrorKind::Format { format } => {
            params.insert("format".to_string(), json!(format));
        }
        ValidationErrorKind::Required { property } => {
            params.insert("missingProperty".to_string(), property.clone());
        }
        ValidationErrorKind::Enum { options } => {
            params.insert("allowedValues".to_string(), options.clone());
        }
        ValidationErrorKind::Constant { expected_value } => {
            params.insert("allowedValue".to_string(), expected_value.clone());
        }
        ValidationErrorKind::Pattern { pattern } => {
            params.insert("pattern".to_string(), json!(pattern));
        }
        ValidationErrorKind::MinLength { limit }
        | ValidationErrorKind::MaxLength { limit }
        | ValidationErrorKind::MinItems { limit }
        | ValidationErrorKind::MaxItems { limit } => {
            params.insert("limit".to_string(), json!(limit));
        }
        ValidationErrorKind::Minimum { limit } | ValidationErrorKind::Maximum { limit } => {
            params.insert("limit".to_string(), limit.clone());
        }
        ValidationErrorKind::AdditionalProperties { unexpected } => {
            params.insert("additionalProperties".to_string(), json!(unexpected));
        }
        _ => {}
    }
    ValidationIssue {
        path: error.instance_path.to_string(),
        message: error.to_string(),
        keyword,
        params,
    }
}
