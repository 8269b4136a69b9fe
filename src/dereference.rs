use crate::REF_FIELD;
use crate::types::json_pointer::JsonPointer;
use dashmap::DashMap;
use serde_json::{Map, Value, json};
use std::borrow::Cow;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Extension key left where a reference re-entered itself.
pub const CIRCULAR_REF_MARKER: &str = "x-circular-ref";

/// Extension key left where a reference could not be resolved inside the document.
pub const UNRESOLVED_REF_MARKER: &str = "x-unresolved-ref";

/// Extension key left where a reference was not inlined because the node budget ran out.
pub const TRUNCATED_REF_MARKER: &str = "x-truncated-ref";

#[derive(Debug)]
pub enum DereferenceError<'a> {
    /// The reference points outside the document (another file or a URL).
    External(Cow<'a, str>),

    /// The pointer does not lead to a node.
    MissingTarget(Cow<'a, str>),
}

impl<'a> DereferenceError<'a> {
    #[inline]
    pub(crate) fn external(reference: impl Into<Cow<'a, str>>) -> Self {
        Self::External(reference.into())
    }

    #[inline]
    pub(crate) fn missing_target(reference: impl Into<Cow<'a, str>>) -> Self {
        Self::MissingTarget(reference.into())
    }
}

impl Display for DereferenceError<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DereferenceError::External(reference) => {
                write!(f, "External reference not supported: {}", reference)
            }
            DereferenceError::MissingTarget(reference) => {
                write!(f, "Reference target not found: {}", reference)
            }
        }
    }
}

impl std::error::Error for DereferenceError<'_> {}

/// Total number of JSON nodes a single dereference pass may inline through references.
pub const DEFAULT_NODE_BUDGET: usize = 1_000_000;

struct Expansion {
    value: Value,
    nodes: usize,
}

/// Replaces every local `$ref` of a document with an inline copy of its target.
///
/// Every reference is expanded once and reused wherever it appears again. A reference met
/// while its own expansion is still in progress becomes a circular placeholder, and once
/// the node budget is spent the remaining references become truncation placeholders.
pub struct Dereferencer<'d> {
    document: &'d Value,
    expanded_references: DashMap<String, Arc<Expansion>>,
    remaining_nodes: AtomicUsize,
}

impl<'d> Dereferencer<'d> {
    pub fn new(document: &'d Value) -> Self {
        Self::with_node_budget(document, DEFAULT_NODE_BUDGET)
    }

    pub fn with_node_budget(document: &'d Value, budget: usize) -> Self {
        Self {
            document,
            expanded_references: DashMap::new(),
            remaining_nodes: AtomicUsize::new(budget),
        }
    }

    /// Returns a reference-free copy of the whole document.
    pub fn dereference(&self) -> Value {
        let mut stack = Vec::new();
        self.expand(self.document, &mut stack)
    }

    fn expand(&self, node: &Value, stack: &mut Vec<String>) -> Value {
        match node {
            Value::Object(object) => match object.get(REF_FIELD).and_then(Value::as_str) {
                Some(reference) => self.expand_reference(reference, object, stack),
                None => Value::Object(
                    object
                        .iter()
                        .map(|(key, child)| (key.clone(), self.expand(child, stack)))
                        .collect(),
                ),
            },
            Value::Array(items) => {
                Value::Array(items.iter().map(|item| self.expand(item, stack)).collect())
            }
            other => other.clone(),
        }
    }

    fn expand_reference(
        &self,
        reference: &str,
        node: &Map<String, Value>,
        stack: &mut Vec<String>,
    ) -> Value {
        let mut target = if stack.iter().any(|seen| seen == reference) {
            log::debug!("Circular reference {} left as a placeholder", reference);
            json!({ CIRCULAR_REF_MARKER: reference })
        } else {
            match self.resolve_with_cache(reference, stack) {
                Ok(expansion) if self.charge(expansion.nodes) => expansion.value.clone(),
                Ok(_) => {
                    log::debug!("Node budget spent, {} left as a placeholder", reference);
                    json!({ TRUNCATED_REF_MARKER: reference })
                }
                Err(e) => {
                    log::warn!("{}", e);
                    json!({ UNRESOLVED_REF_MARKER: reference })
                }
            }
        };

        // Keys written next to `$ref` refine the target.
        if let Value::Object(target_object) = &mut target {
            for (key, sibling) in node.iter().filter(|(key, _)| key.as_str() != REF_FIELD) {
                target_object.insert(key.clone(), self.expand(sibling, stack));
            }
        }
        target
    }

    fn resolve_with_cache<'a>(
        &self,
        reference: &'a str,
        stack: &mut Vec<String>,
    ) -> Result<Arc<Expansion>, DereferenceError<'a>> {
        if let Some(cached) = self.expanded_references.get(reference) {
            return Ok(Arc::clone(cached.value()));
        }

        let raw_target = self.lookup(reference)?;
        stack.push(reference.to_string());
        let value = self.expand(raw_target, stack);
        stack.pop();

        let expansion = Arc::new(Expansion {
            nodes: node_count(&value),
            value,
        });
        self.expanded_references
            .insert(reference.to_string(), Arc::clone(&expansion));
        Ok(expansion)
    }

    /// Takes `nodes` from the remaining budget; false when there is not enough left.
    fn charge(&self, nodes: usize) -> bool {
        self.remaining_nodes
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |remaining| {
                remaining.checked_sub(nodes)
            })
            .is_ok()
    }

    fn lookup<'a>(&self, reference: &'a str) -> Result<&'d Value, DereferenceError<'a>> {
        let pointer =
            JsonPointer::from_reference(reference).ok_or(DereferenceError::external(reference))?;
        self.document
            .pointer(&pointer.format_pointer())
            .ok_or(DereferenceError::missing_target(reference))
    }
}

fn node_count(value: &Value) -> usize {
    match value {
        Value::Object(object) => 1 + object.values().map(node_count).sum::<usize>(),
        Value::Array(items) => 1 + items.iter().map(node_count).sum::<usize>(),
        _ => 1,
    }
}

/// Whether any `$ref` key survives anywhere under `value`.
#[cfg(test)]
pub(crate) fn contains_reference(value: &Value) -> bool {
    match value {
        Value::Object(object) => {
            object.contains_key(REF_FIELD) || object.values().any(contains_reference)
        }
        Value::Array(items) => items.iter().any(contains_reference),
        _ => false,
    }
}
