//! TypeScript-flavoured structural descriptions of JSON schemas.

use crate::types::HttpMethod;
use crate::types::schema::{AdditionalProperties, JsonSchema};
use heck::ToUpperCamelCase;
use serde_json::Value;

const UNKNOWN: &str = "unknown";
const INDENT: &str = "  ";
const DEFAULT_MAX_DEPTH: usize = 10;

/// Declaration name for a schema: UpperCamelCase, prefixed when it would start with a digit.
pub fn type_name(raw: &str) -> String {
    let name = raw.to_upper_camel_case();
    match name.chars().next() {
        None => "Anonymous".to_string(),
        Some(first) if first.is_ascii_digit() => format!("T{}", name),
        Some(_) => name,
    }
}

/// `<Method><Path><suffix>`, e.g. `GetUsersIdResponse` for `get /users/{id}`.
pub fn endpoint_type_name(method: HttpMethod, path: &str, suffix: &str) -> String {
    let path_words: Vec<&str> = path
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|word| !word.is_empty())
        .collect();
    type_name(&format!("{} {} {}", method.as_str(), path_words.join(" "), suffix))
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' || first == '$' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        }
        _ => false,
    }
}

fn property_key(name: &str) -> String {
    if is_identifier(name) {
        name.to_string()
    } else {
        Value::String(name.to_string()).to_string()
    }
}

/// Whether `text` has a `|` or `&` outside any brackets, i.e. needs parentheses when used
/// as an array element or intersection member.
fn is_compound(text: &str) -> bool {
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;
    for c in text.chars() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' | '(' | '<' | '[' => depth += 1,
            '}' | ')' | '>' | ']' => depth -= 1,
            '|' | '&' if depth == 0 => return true,
            _ => {}
        }
    }
    false
}

fn parenthesize(text: String) -> String {
    if is_compound(&text) {
        format!("({})", text)
    } else {
        text
    }
}

fn doc_comment(lines: &[String], indent: &str) -> String {
    match lines {
        [] => String::new(),
        [line] => format!("{}/** {} */\n", indent, line),
        lines => {
            let mut comment = format!("{}/**\n", indent);
            for line in lines {
                comment.push_str(&format!("{} * {}\n", indent, line));
            }
            comment.push_str(&format!("{} */\n", indent));
            comment
        }
    }
}

fn doc_lines(schema: &JsonSchema) -> Vec<String> {
    let mut lines: Vec<String> = schema
        .description
        .as_deref()
        .map(|description| {
            description
                .lines()
                .map(|line| line.trim_end().replace("*/", "*\\/"))
                .filter(|line| !line.is_empty())
                .collect()
        })
        .unwrap_or_default();
    if schema.read_only == Some(true) {
        lines.push("@readonly".to_string());
    }
    if schema.deprecated == Some(true) {
        lines.push("@deprecated".to_string());
    }
    lines
}

/// Renders schemas as type expressions or named declarations.
#[derive(Debug, Clone)]
pub struct TypeEmitter {
    max_depth: usize,
}

impl Default for TypeEmitter {
    fn default() -> Self {
        TypeEmitter::new(DEFAULT_MAX_DEPTH)
    }
}

impl TypeEmitter {
    pub fn new(max_depth: usize) -> Self {
        TypeEmitter { max_depth }
    }

    /// `interface Name { … }` for object-shaped roots, `type Name = …;` otherwise; with
    /// `top_level` unset only the type expression is returned.
    pub fn emit(&self, schema: &JsonSchema, name: &str, top_level: bool) -> String {
        let body = self.render_at(schema, 0, 0);
        if !top_level {
            return body;
        }
        let name = type_name(name);
        let doc = doc_comment(&doc_lines(schema), "");
        if is_plain_object(schema) && !schema.allows_null() {
            format!("{}interface {} {}", doc, name, body)
        } else {
            format!("{}type {} = {};", doc, name, body)
        }
    }

    pub fn render(&self, schema: &JsonSchema) -> String {
        self.render_at(schema, 0, 0)
    }

    fn render_at(&self, schema: &JsonSchema, depth: usize, indent: usize) -> String {
        if depth > self.max_depth {
            return UNKNOWN.to_string();
        }
        let rendered = self.render_shape(schema, depth, indent);
        if schema.is_nullable() && !rendered.split(" | ").any(|part| part == "null") {
            format!("{} | null", rendered)
        } else {
            rendered
        }
    }

    fn render_shape(&self, schema: &JsonSchema, depth: usize, indent: usize) -> String {
        if let Some(values) = &schema.enum_values {
            if !values.is_empty() {
                return values
                    .iter()
                    .map(Value::to_string)
                    .collect::<Vec<_>>()
                    .join(" | ");
            }
        }
        if let Some(constant) = &schema.const_value {
            return constant.to_string();
        }
        if let Some(branches) = &schema.all_of {
            let mut members: Vec<String> = Vec::new();
            if schema.properties.is_some() {
                members.push(self.object(schema, depth, indent));
            }
            members.extend(
                branches
                    .iter()
                    .map(|branch| parenthesize(self.render_at(branch, depth + 1, indent))),
            );
            return members.join(" & ");
        }
        if let Some(branches) = schema.one_of.as_ref().or(schema.any_of.as_ref()) {
            return branches
                .iter()
                .map(|branch| self.render_at(branch, depth + 1, indent))
                .collect::<Vec<_>>()
                .join(" | ");
        }

        let type_names: Vec<&str> = match &schema.schema_type {
            Some(types) => types.names(),
            None => schema.effective_type().into_iter().collect(),
        };
        if type_names.is_empty() {
            return UNKNOWN.to_string();
        }
        let mut rendered: Vec<String> = Vec::with_capacity(type_names.len());
        for type_name in type_names {
            let text = match type_name {
                "string" => "string".to_string(),
                "integer" | "number" => "number".to_string(),
                "boolean" => "boolean".to_string(),
                "null" => "null".to_string(),
                "array" => self.array(schema, depth, indent),
                "object" => self.object(schema, depth, indent),
                _ => UNKNOWN.to_string(),
            };
            if !rendered.contains(&text) {
                rendered.push(text);
            }
        }
        rendered.join(" | ")
    }

    fn array(&self, schema: &JsonSchema, depth: usize, indent: usize) -> String {
        match &schema.items {
            Some(items) => format!(
                "{}[]",
                parenthesize(self.render_at(items, depth + 1, indent))
            ),
            None => format!("{}[]", UNKNOWN),
        }
    }

    fn object(&self, schema: &JsonSchema, depth: usize, indent: usize) -> String {
        let extra = match &schema.additional_properties {
            Some(AdditionalProperties::Schema(values)) => {
                Some(self.render_at(values, depth + 1, indent + 1))
            }
            Some(AdditionalProperties::Allowed(false)) => None,
            Some(AdditionalProperties::Allowed(true)) => Some(UNKNOWN.to_string()),
            None => None,
        };
        let Some(properties) = &schema.properties else {
            return match (&schema.additional_properties, extra) {
                (Some(AdditionalProperties::Allowed(false)), _) => {
                    "Record<string, never>".to_string()
                }
                (_, Some(values)) => format!("Record<string, {}>", values),
                (_, None) => format!("Record<string, {}>", UNKNOWN),
            };
        };
        if properties.is_empty() && extra.is_none() {
            return "{}".to_string();
        }

        let field_indent = INDENT.repeat(indent + 1);
        let mut body = String::from("{\n");
        for (name, property) in properties {
            body.push_str(&doc_comment(&doc_lines(property), &field_indent));
            let optional = if schema.is_required(name) { "" } else { "?" };
            body.push_str(&format!(
                "{}{}{}: {};\n",
                field_indent,
                property_key(name),
                optional,
                self.render_at(property, depth + 1, indent + 1)
            ));
        }
        if let Some(values) = extra {
            body.push_str(&format!("{}[key: string]: {};\n", field_indent, values));
        }
        body.push_str(&INDENT.repeat(indent));
        body.push('}');
        body
    }
}

/// An object with declared properties and nothing that would turn it into a union,
/// intersection or literal.
fn is_plain_object(schema: &JsonSchema) -> bool {
    schema.properties.is_some()
        && schema.enum_values.is_none()
        && schema.const_value.is_none()
        && !schema.has_composition()
        && schema.effective_type() == Some("object")
        && schema
            .schema_type
            .as_ref()
            .is_none_or(|types| types.names().len() == 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn schema(raw: Value) -> JsonSchema {
        JsonSchema::from_value(&raw)
    }

    fn render(raw: Value) -> String {
        TypeEmitter::default().render(&schema(raw))
    }

    #[test]
    fn test_interface_declaration() {
        let pet = schema(json!({
            "type": "object",
            "description": "A pet",
            "required": ["id"],
            "properties": {
                "id": {"type": "integer", "description": "Identifier", "readOnly": true},
                "name": {"type": "string"},
                "x-tag": {"type": "string", "deprecated": true},
                "owner": {"type": "object", "properties": {"email": {"type": "string"}}}
            }
        }));
        let expected = r#"/** A pet */
interface Pet {
  /**
   * Identifier
   * @readonly
   */
  id: number;
  name?: string;
  /** @deprecated */
  "x-tag"?: string;
  owner?: {
    email?: string;
  };
}"#;
        assert_eq!(TypeEmitter::default().emit(&pet, "pet", true), expected);
    }

    #[test]
    fn test_misfit_property_keeps_interface() {
        let order = schema(json!({
            "type": "object",
            "required": ["a"],
            "properties": {
                "a": {"type": "string"},
                "b": {"type": "string", "required": true}
            }
        }));
        assert_eq!(
            TypeEmitter::default().emit(&order, "order", true),
            "interface Order {\n  a: string;\n  b?: string;\n}"
        );
    }

    #[test]
    fn test_alias_for_non_object_root() {
        let emitter = TypeEmitter::default();
        assert_eq!(
            emitter.emit(&schema(json!({"type": "string", "enum": ["a", "b"]})), "status", true),
            r#"type Status = "a" | "b";"#
        );
        assert_eq!(
            emitter.emit(
                &schema(json!({"type": "array", "items": {"type": "string"}})),
                "names",
                true
            ),
            "type Names = string[];"
        );
    }

    #[test]
    fn test_composition() {
        assert_eq!(
            render(json!({"oneOf": [{"type": "string"}, {"type": "number"}]})),
            "string | number"
        );
        assert_eq!(
            render(json!({"allOf": [
                {"type": "object", "properties": {"a": {"type": "string"}}},
                {"oneOf": [{"type": "string"}, {"type": "boolean"}]}
            ]})),
            "{\n  a?: string;\n} & (string | boolean)"
        );
    }

    #[test]
    fn test_primitives_literals_and_nullability() {
        assert_eq!(render(json!({"type": "integer"})), "number");
        assert_eq!(render(json!({"type": "boolean", "nullable": true})), "boolean | null");
        assert_eq!(render(json!({"type": ["string", "null"]})), "string | null");
        assert_eq!(render(json!({"const": 3})), "3");
        assert_eq!(render(json!({"not": {"type": "string"}})), "unknown");
        assert_eq!(render(json!({})), "unknown");
    }

    #[test]
    fn test_arrays() {
        assert_eq!(render(json!({"type": "array"})), "unknown[]");
        assert_eq!(
            render(json!({"type": "array", "items": {"type": ["string", "integer"]}})),
            "(string | number)[]"
        );
    }

    #[test]
    fn test_index_maps() {
        assert_eq!(
            render(json!({"type": "object", "additionalProperties": {"type": "integer"}})),
            "Record<string, number>"
        );
        assert_eq!(render(json!({"type": "object"})), "Record<string, unknown>");
        assert_eq!(
            render(json!({"type": "object", "properties": {}, "additionalProperties": false})),
            "{}"
        );
        assert_eq!(
            render(json!({
                "type": "object",
                "properties": {"id": {"type": "string"}},
                "additionalProperties": {"type": "boolean"}
            })),
            "{\n  id?: string;\n  [key: string]: boolean;\n}"
        );
    }

    #[test]
    fn test_depth_guard() {
        let mut node = json!({"type": "string"});
        for _ in 0..20 {
            node = json!({"type": "array", "items": node});
        }
        let rendered = TypeEmitter::new(3).render(&schema(node));
        assert_eq!(rendered, "unknown[][][][]");
    }

    #[test]
    fn test_names() {
        assert_eq!(type_name("pet_store"), "PetStore");
        assert_eq!(type_name("404-error"), "T404Error");
        assert_eq!(
            endpoint_type_name(HttpMethod::Get, "/users/{id}", "Response"),
            "GetUsersIdResponse"
        );
        assert_eq!(
            endpoint_type_name(HttpMethod::Post, "/pets", "Request"),
            "PostPetsRequest"
        );
    }
}
