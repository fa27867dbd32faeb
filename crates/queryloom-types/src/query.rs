//! Wire type for generator output.
//!
//! `GeneratedQuery` is the JSON-schema-constrained shape every generation
//! strategy returns. The schema derived here is handed to the LLM provider
//! as a structured-output format, so the derive and the post-pass below are
//! part of the wire contract.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One strategy's answer: a query plus optional schema-refinement notes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct GeneratedQuery {
    /// The proposed SQL, ready to execute against the configured dialect.
    pub query: String,
    /// Schema-refinement suggestions. Most strategies return none; the
    /// advanced strategy fills this in.
    #[serde(default)]
    pub suggestions: Vec<String>,
}

/// Recursively set `additionalProperties: false` on every object schema.
///
/// OpenAI strict structured output rejects schemas that leave object
/// properties open.
pub fn add_additional_properties_false(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            let is_object_schema = map
                .get("type")
                .and_then(|t| t.as_str())
                .is_some_and(|t| t == "object")
                || map.contains_key("properties");
            if is_object_schema {
                map.insert(
                    "additionalProperties".to_string(),
                    serde_json::Value::Bool(false),
                );
            }
            for nested in map.values_mut() {
                add_additional_properties_false(nested);
            }
        }
        serde_json::Value::Array(items) => {
            for nested in items {
                add_additional_properties_false(nested);
            }
        }
        _ => {}
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_query_json_roundtrip() {
        let generated = GeneratedQuery {
            query: "SELECT id, name FROM customers ORDER BY created_at DESC LIMIT 5".to_string(),
            suggestions: vec!["consider an index on created_at".to_string()],
        };
        let json = serde_json::to_string(&generated).unwrap();
        let parsed: GeneratedQuery = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, generated);
    }

    #[test]
    fn test_suggestions_default_to_empty() {
        let parsed: GeneratedQuery = serde_json::from_str(r#"{"query":"SELECT 1"}"#).unwrap();
        assert_eq!(parsed.query, "SELECT 1");
        assert!(parsed.suggestions.is_empty());
    }

    #[test]
    fn test_schema_closes_object_properties() {
        let schema = schemars::schema_for!(GeneratedQuery);
        let mut value = serde_json::to_value(schema).unwrap();
        add_additional_properties_false(&mut value);
        assert_eq!(value["additionalProperties"], serde_json::json!(false));
        assert!(value["properties"]["query"].is_object());
        assert!(value["properties"]["suggestions"].is_object());
    }
}
