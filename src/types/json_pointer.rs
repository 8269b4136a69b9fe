use crate::PATH_SEPARATOR;
use serde::Serialize;

/// An RFC 6901 JSON pointer, kept as already-escaped segments.
#[derive(Debug, Clone, Serialize, Default, PartialEq, Eq)]
pub struct JsonPointer(pub Vec<String>);

impl JsonPointer {
    pub fn new() -> Self {
        JsonPointer(Vec::new())
    }

    /// Parses a local reference such as `#/components/schemas/User` (the leading `#` is
    /// optional). Returns `None` for anything that is not a document-local pointer.
    pub fn from_reference(reference: &str) -> Option<Self> {
        let pointer = reference.strip_prefix('#').unwrap_or(reference);
        if pointer.is_empty() {
            return Some(JsonPointer::new());
        }
        let pointer = pointer.strip_prefix(PATH_SEPARATOR)?;
        Some(JsonPointer(
            pointer.split(PATH_SEPARATOR).map(str::to_owned).collect(),
        ))
    }

    /// Pointer string usable with [`serde_json::Value::pointer`].
    pub fn format_pointer(&self) -> String {
        if self.0.is_empty() {
            return String::new();
        }
        format!("{}{}", PATH_SEPARATOR, self.0.join(PATH_SEPARATOR))
    }
}
