use crate::types::schema::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

const DEFAULT_STRING: &str = "string";
const DEFAULT_MAX_DEPTH: usize = 10;
/// Upper bounds applied whatever `minItems` / `minLength` ask for.
const MAX_SAMPLE_ARRAY_ITEMS: usize = 100;
const MAX_SAMPLE_STRING_LENGTH: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SampleOptions {
    /// Emit properties that are not listed in `required`.
    pub include_optional: bool,
    /// Nesting depth past which `null` is emitted instead of a value.
    pub max_depth: usize,
    /// Upper bound on generated array length.
    pub max_array_items: Option<usize>,
}

impl Default for SampleOptions {
    fn default() -> Self {
        SampleOptions {
            include_optional: false,
            max_depth: DEFAULT_MAX_DEPTH,
            max_array_items: None,
        }
    }
}

/// Fixed literal for a string `format`, if the format is known.
fn format_sample(format: &str) -> Option<&'static str> {
    let sample = match format {
        "email" => "user@example.com",
        "date" => "2024-01-01",
        "date-time" => "2024-01-01T00:00:00Z",
        "time" => "00:00:00",
        "uuid" => "123e4567-e89b-12d3-a456-426614174000",
        "uri" | "url" => "https://example.com",
        "hostname" => "example.com",
        "ipv4" => "192.168.1.1",
        "ipv6" => "2001:db8::1",
        "byte" => "U3dhZ2dlciByb2Nrcw==",
        "binary" => "<binary>",
        "password" => "********",
        _ => return None,
    };
    Some(sample)
}

/// Deterministic example values for JSON schemas.
#[derive(Debug, Clone, Default)]
pub struct SampleGenerator {
    options: SampleOptions,
}

impl SampleGenerator {
    pub fn new(options: SampleOptions) -> Self {
        SampleGenerator { options }
    }

    pub fn options(&self) -> &SampleOptions {
        &self.options
    }

    pub fn generate(&self, schema: &JsonSchema) -> Value {
        self.generate_at(schema, 0)
    }

    fn generate_at(&self, schema: &JsonSchema, depth: usize) -> Value {
        if depth > self.options.max_depth {
            return Value::Null;
        }
        if let Some(example) = &schema.example {
            return example.clone();
        }
        if let Some(default) = &schema.default {
            return default.clone();
        }
        if let Some(constant) = &schema.const_value {
            return constant.clone();
        }
        if let Some(first) = schema.enum_values.as_ref().and_then(|values| values.first()) {
            return first.clone();
        }
        if schema.is_nullable() && schema.schema_type.is_none() {
            return Value::Null;
        }
        if let Some(branches) = &schema.all_of {
            return self.merge_all_of(schema, branches, depth);
        }
        if let Some(first) = schema
            .one_of
            .as_ref()
            .or(schema.any_of.as_ref())
            .and_then(|branches| branches.first())
        {
            return self.generate_at(first, depth + 1);
        }

        match schema.effective_type() {
            Some("string") => Value::String(self.string(schema)),
            Some("integer") => json!(number(schema).floor() as i64),
            Some("number") => json!(number(schema)),
            Some("boolean") => Value::Bool(false),
            Some("array") => self.array(schema, depth),
            Some("object") => Value::Object(self.object(schema, depth)),
            _ => Value::Null,
        }
    }

    /// Samples every branch and shallow-merges the object results; later keys win.
    fn merge_all_of(&self, schema: &JsonSchema, branches: &[JsonSchema], depth: usize) -> Value {
        let mut merged = if schema.properties.is_some() {
            Some(self.object(schema, depth))
        } else {
            None
        };
        let mut fallback = None;
        for branch in branches {
            match self.generate_at(branch, depth + 1) {
                Value::Object(fields) => merged.get_or_insert_with(Map::new).extend(fields),
                Value::Null => {}
                other => {
                    fallback.get_or_insert(other);
                }
            }
        }
        merged
            .map(Value::Object)
            .or(fallback)
            .unwrap_or(Value::Null)
    }

    fn string(&self, schema: &JsonSchema) -> String {
        if let Some(sample) = schema.format.as_deref().and_then(format_sample) {
            return sample.to_string();
        }
        let mut value = DEFAULT_STRING.to_string();
        if let Some(min_length) = schema.min_length {
            let target = usize::try_from(min_length)
                .unwrap_or(usize::MAX)
                .min(MAX_SAMPLE_STRING_LENGTH);
            if value.len() < target {
                value.push_str(&"x".repeat(target - value.len()));
            }
        }
        if let Some(max_length) = schema.max_length {
            value.truncate(max_length as usize);
        }
        value
    }

    fn array(&self, schema: &JsonSchema, depth: usize) -> Value {
        let Some(items) = &schema.items else {
            return Value::Array(Vec::new());
        };
        let cap = self
            .options
            .max_array_items
            .map_or(MAX_SAMPLE_ARRAY_ITEMS, |cap| cap.min(MAX_SAMPLE_ARRAY_ITEMS));
        let count = schema
            .min_items
            .map_or(1, |min| usize::try_from(min.max(1)).unwrap_or(usize::MAX))
            .min(cap);
        if count == 0 {
            return Value::Array(Vec::new());
        }
        let item = self.generate_at(items, depth + 1);
        Value::Array(vec![item; count])
    }

    fn object(&self, schema: &JsonSchema, depth: usize) -> Map<String, Value> {
        let mut fields = Map::new();
        let Some(properties) = &schema.properties else {
            return fields;
        };
        for (name, property) in properties {
            if self.options.include_optional || schema.is_required(name) {
                fields.insert(name.clone(), self.generate_at(property, depth + 1));
            }
        }
        fields
    }
}

/// `minimum` when given, else the midpoint between 0 and `maximum` (or 100).
fn number(schema: &JsonSchema) -> f64 {
    match (schema.minimum, schema.maximum) {
        (Some(minimum), _) => minimum,
        (None, maximum) => maximum.unwrap_or(100.0) / 2.0,
    }
}
