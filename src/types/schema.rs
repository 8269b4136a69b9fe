use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// `type` keyword: a single name (2.0 / 3.0) or a list of names (3.1).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum SchemaType {
    Single(String),
    Multiple(Vec<String>),
}

impl SchemaType {
    pub fn names(&self) -> Vec<&str> {
        match self {
            SchemaType::Single(name) => vec![name.as_str()],
            SchemaType::Multiple(names) => names.iter().map(String::as_str).collect(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names().contains(&name)
    }
}

/// `additionalProperties`: either a boolean switch or a schema for the extra values.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum AdditionalProperties {
    Allowed(bool),
    Schema(Box<JsonSchema>),
}

/// A dereferenced JSON Schema node.
///
/// The vocabulary the crate acts on is typed; every other key (vendor extensions,
/// keywords the crate does not interpret) lands in `extensions` and is written back
/// out unchanged.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonSchema {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<SchemaType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
    #[serde(rename = "const", skip_serializing_if = "Option::is_none")]
    pub const_value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nullable: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<IndexMap<String, JsonSchema>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<AdditionalProperties>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<JsonSchema>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub all_of: Option<Vec<JsonSchema>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub one_of: Option<Vec<JsonSchema>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub any_of: Option<Vec<JsonSchema>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not: Option<Box<JsonSchema>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclusive_minimum: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclusive_maximum: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multiple_of: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_items: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_items: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unique_items: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_only: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub write_only: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deprecated: Option<bool>,

    #[serde(flatten)]
    pub extensions: IndexMap<String, Value>,
}

/// Keywords holding subschemas; parsed node by node so one bad child stays local.
const SUBSCHEMA_KEYWORDS: [&str; 7] = [
    "properties",
    "additionalProperties",
    "items",
    "allOf",
    "oneOf",
    "anyOf",
    "not",
];

/// Count keywords that documents sometimes write as whole floats (`1.0`).
const COUNT_KEYWORDS: [&str; 4] = ["minLength", "maxLength", "minItems", "maxItems"];

impl JsonSchema {
    /// Builds a schema from a raw JSON node.
    ///
    /// `true` is the empty schema and `false` is `{"not": {}}`. A keyword whose value does
    /// not fit the model (a tuple-style `items`, `required: true` on a property) is kept
    /// as an extension of its own node, so its siblings and the rest of the tree stay
    /// typed and nothing is dropped on the way back out.
    pub fn from_value(value: &Value) -> JsonSchema {
        let object = match value {
            Value::Object(object) => object,
            Value::Bool(true) => return JsonSchema::default(),
            Value::Bool(false) => {
                return JsonSchema {
                    not: Some(Box::default()),
                    ..JsonSchema::default()
                };
            }
            other => {
                log::warn!("Schema node is not an object: {}", other);
                return JsonSchema::default();
            }
        };

        let keywords: Map<String, Value> = object
            .iter()
            .filter(|(key, _)| !SUBSCHEMA_KEYWORDS.contains(&key.as_str()))
            .map(|(key, keyword)| (key.clone(), coerce_count(key, keyword)))
            .collect();
        let mut schema = Self::from_keywords(keywords);

        for (key, child) in object {
            if !SUBSCHEMA_KEYWORDS.contains(&key.as_str()) {
                continue;
            }
            let fitted = match (key.as_str(), child) {
                ("properties", Value::Object(properties)) => {
                    schema.properties = Some(
                        properties
                            .iter()
                            .map(|(name, property)| (name.clone(), Self::from_value(property)))
                            .collect(),
                    );
                    true
                }
                ("additionalProperties", Value::Bool(allowed)) => {
                    schema.additional_properties = Some(AdditionalProperties::Allowed(*allowed));
                    true
                }
                ("additionalProperties", Value::Object(_)) => {
                    schema.additional_properties = Some(AdditionalProperties::Schema(Box::new(
                        Self::from_value(child),
                    )));
                    true
                }
                ("items", Value::Object(_) | Value::Bool(_)) => {
                    schema.items = Some(Box::new(Self::from_value(child)));
                    true
                }
                ("not", Value::Object(_) | Value::Bool(_)) => {
                    schema.not = Some(Box::new(Self::from_value(child)));
                    true
                }
                ("allOf", Value::Array(branches)) => {
                    schema.all_of = Some(branches.iter().map(Self::from_value).collect());
                    true
                }
                ("oneOf", Value::Array(branches)) => {
                    schema.one_of = Some(branches.iter().map(Self::from_value).collect());
                    true
                }
                ("anyOf", Value::Array(branches)) => {
                    schema.any_of = Some(branches.iter().map(Self::from_value).collect());
                    true
                }
                _ => false,
            };
            if !fitted {
                log::warn!("Keeping `{}` as an extension, it does not fit the model", key);
                schema.extensions.insert(key.clone(), child.clone());
            }
        }
        schema
    }

    /// Deserializes the non-subschema keywords of one node, moving any keyword whose value
    /// has an unexpected shape into `extensions`.
    fn from_keywords(keywords: Map<String, Value>) -> JsonSchema {
        if let Ok(schema) = serde_json::from_value(Value::Object(keywords.clone())) {
            return schema;
        }

        let mut fitting = Map::with_capacity(keywords.len());
        let mut misfits = IndexMap::new();
        for (key, keyword) in keywords {
            let alone = Value::Object(Map::from_iter([(key.clone(), keyword.clone())]));
            if serde_json::from_value::<JsonSchema>(alone).is_ok() {
                fitting.insert(key, keyword);
            } else {
                log::warn!("Keeping `{}` as an extension, it does not fit the model", key);
                misfits.insert(key, keyword);
            }
        }
        let mut schema: JsonSchema =
            serde_json::from_value(Value::Object(fitting)).unwrap_or_default();
        schema.extensions.extend(misfits);
        schema
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    pub fn of_type(name: &str) -> JsonSchema {
        JsonSchema {
            schema_type: Some(SchemaType::Single(name.to_string())),
            ..JsonSchema::default()
        }
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable.unwrap_or(false)
    }

    pub fn is_required(&self, property: &str) -> bool {
        self.required.iter().any(|name| name == property)
    }

    /// The first non-`null` type name, or `null` when it is the only one declared.
    pub fn primary_type(&self) -> Option<&str> {
        let names = self.schema_type.as_ref()?.names();
        names
            .iter()
            .copied()
            .find(|name| *name != "null")
            .or_else(|| names.first().copied())
    }

    /// Whether any `null` type is declared (3.1 type lists) or `nullable` is set (3.0).
    pub fn allows_null(&self) -> bool {
        self.is_nullable()
            || self
                .schema_type
                .as_ref()
                .is_some_and(|types| types.contains("null"))
    }

    /// Type name used for dispatch: the declared one, else inferred from structure.
    pub fn effective_type(&self) -> Option<&str> {
        if let Some(declared) = self.primary_type() {
            return Some(declared);
        }
        if self.properties.is_some() || self.additional_properties.is_some() {
            Some("object")
        } else if self.items.is_some() {
            Some("array")
        } else {
            None
        }
    }

    pub fn has_composition(&self) -> bool {
        self.all_of.is_some() || self.one_of.is_some() || self.any_of.is_some()
    }
}

/// Turns a whole float such as `1.0` into an integer for the count keywords.
fn coerce_count(key: &str, keyword: &Value) -> Value {
    match keyword.as_f64() {
        Some(count)
            if COUNT_KEYWORDS.contains(&key)
                && keyword.is_f64()
                && count >= 0.0
                && count.fract() == 0.0
                && count <= u64::MAX as f64 =>
        {
            Value::from(count as u64)
        }
        _ => keyword.clone(),
    }
}
