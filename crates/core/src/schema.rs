//! Schema descriptors.
//!
//! A `Schema` is a JSON-Schema-shaped value sent alongside a prompt to bias
//! the model toward a parseable reply. It is advisory: nothing here rejects
//! a reply that ignores it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// An advisory structural contract (`type`, `properties`, `required`, `enum`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema(Value);

impl Schema {
    /// Wrap an arbitrary JSON-Schema-like value.
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn string() -> Self {
        Self(json!({"type": "string"}))
    }

    pub fn string_enum(values: &[&str]) -> Self {
        Self(json!({"type": "string", "enum": values}))
    }

    pub fn array(items: Schema) -> Self {
        Self(json!({"type": "array", "items": items.0}))
    }

    /// An object with no declared properties (open mapping).
    pub fn open_object() -> Self {
        Self(json!({"type": "object"}))
    }

    /// An object with named properties and a required-field list.
    pub fn object<'a>(
        properties: impl IntoIterator<Item = (&'a str, Schema)>,
        required: &[&str],
    ) -> Self {
        let props: Map<String, Value> = properties
            .into_iter()
            .map(|(name, schema)| (name.to_string(), schema.0))
            .collect();
        let mut obj = json!({"type": "object", "properties": props});
        if !required.is_empty() {
            obj["required"] = json!(required);
        }
        Self(obj)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// The top-level required-field names.
    pub fn required(&self) -> Vec<&str> {
        self.0["required"]
            .as_array()
            .map(|r| r.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    /// Schema of a named property, if declared.
    pub fn property(&self, name: &str) -> Option<Schema> {
        self.0["properties"].get(name).cloned().map(Schema)
    }

    /// Required fields (top level and one object level down) absent from
    /// `value`, as dotted paths. Used for diagnostics only.
    pub fn missing_required(&self, value: &Value) -> Vec<String> {
        let mut missing = Vec::new();
        for field in self.required() {
            if value.get(field).is_none() {
                missing.push(field.to_string());
            }
        }
        if let Some(props) = self.0["properties"].as_object() {
            for (name, prop) in props {
                let Some(inner) = value.get(name) else { continue };
                let nested = Schema(prop.clone());
                for field in nested.required() {
                    if inner.get(field).is_none() {
                        missing.push(format!("{name}.{field}"));
                    }
                }
            }
        }
        missing
    }

    /// The instruction appended to a prompt by `schema_call`.
    pub fn instruction(&self) -> String {
        let rendered = serde_json::to_string_pretty(&self.0).unwrap_or_else(|_| self.0.to_string());
        format!("\n\nRespond ONLY with valid JSON matching this schema:\n```json\n{rendered}\n```")
    }
}

impl From<Value> for Schema {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Schema {
        Schema::object(
            [
                ("kind", Schema::string_enum(&["a", "b"])),
                (
                    "body",
                    Schema::object([("text", Schema::string())], &["text"]),
                ),
                ("tags", Schema::array(Schema::string())),
            ],
            &["kind", "body"],
        )
    }

    #[test]
    fn builds_json_schema_shape() {
        let schema = sample();
        let v = schema.as_value();
        assert_eq!(v["type"], "object");
        assert_eq!(v["properties"]["kind"]["enum"], json!(["a", "b"]));
        assert_eq!(v["properties"]["tags"]["items"]["type"], "string");
        assert_eq!(schema.required(), vec!["kind", "body"]);
    }

    #[test]
    fn object_without_required_omits_key() {
        let schema = Schema::object([("x", Schema::string())], &[]);
        assert!(schema.as_value().get("required").is_none());
        assert!(schema.required().is_empty());
    }

    #[test]
    fn missing_required_reports_paths() {
        let schema = sample();
        let missing = schema.missing_required(&json!({"body": {}}));
        assert_eq!(missing, vec!["kind".to_string(), "body.text".to_string()]);
        assert!(
            schema
                .missing_required(&json!({"kind": "a", "body": {"text": "t"}}))
                .is_empty()
        );
    }

    #[test]
    fn instruction_contains_fenced_schema() {
        let text = Schema::string().instruction();
        assert!(text.starts_with("\n\nRespond ONLY with valid JSON"));
        assert!(text.contains("```json\n"));
        assert!(text.contains("\"type\": \"string\""));
        assert!(text.ends_with("```"));
    }

    #[test]
    fn property_lookup() {
        let schema = sample();
        assert_eq!(schema.property("tags").unwrap().as_value()["type"], "array");
        assert!(schema.property("nope").is_none());
    }
}
