//! Payload assembly primitives
//!
//! [`PayloadBuilder`] accumulates named entries into a flat JSON object,
//! dropping nulls and empty strings as they arrive.
//! [`strip_empty_properties`] does the same recursively over an already
//! built value, so context snapshots merged into a payload never carry
//! dead keys.

use serde_json::{Map, Value};

/// Accumulates payload entries, skipping values with nothing in them.
#[derive(Debug, Default, Clone)]
pub struct PayloadBuilder {
    entries: Map<String, Value>,
}

impl PayloadBuilder {
    /// An empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one entry. Null values and empty strings are dropped;
    /// re-adding a key overwrites the previous value.
    pub fn add(&mut self, key: impl Into<String>, value: Value) -> &mut Self {
        if is_empty_value(&value) {
            return self;
        }
        self.entries.insert(key.into(), value);
        self
    }

    /// Add every entry of a JSON object. Non-object values are ignored.
    pub fn add_map(&mut self, value: Value) -> &mut Self {
        if let Value::Object(map) = value {
            for (key, entry) in map {
                self.add(key, entry);
            }
        }
        self
    }

    /// Finish, producing the assembled object.
    #[must_use]
    pub fn build(self) -> Map<String, Value> {
        self.entries
    }
}

/// Whether a value carries no information worth serializing.
fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Recursively remove null-valued keys from nested objects.
///
/// Empty strings survive here (only the builder drops them at insert
/// time); arrays pass through untouched, elements included.
#[must_use]
pub fn strip_empty_properties(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k, strip_empty_properties(v)))
                .collect(),
        ),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_add_skips_null_and_empty_string() {
        let mut builder = PayloadBuilder::new();
        builder
            .add("kept", json!("value"))
            .add("nulled", Value::Null)
            .add("blank", json!(""))
            .add("zero", json!(0));
        let built = builder.build();
        assert_eq!(built.len(), 2);
        assert!(built.contains_key("kept"));
        assert!(built.contains_key("zero"));
    }

    #[test]
    fn test_add_overwrites_existing_key() {
        let mut builder = PayloadBuilder::new();
        builder.add("brand", json!("first")).add("brand", json!("second"));
        assert_eq!(builder.build()["brand"], json!("second"));
    }

    #[test]
    fn test_add_map_merges_object_entries() {
        let mut builder = PayloadBuilder::new();
        builder.add_map(json!({"a": 1, "b": null, "c": "x"}));
        let built = builder.build();
        assert_eq!(built.len(), 2);
        assert_eq!(built["a"], json!(1));
        assert_eq!(built["c"], json!("x"));
    }

    #[test]
    fn test_add_map_ignores_non_objects() {
        let mut builder = PayloadBuilder::new();
        builder.add_map(json!([1, 2, 3]));
        assert!(builder.build().is_empty());
    }

    #[test]
    fn test_strip_removes_nested_nulls() {
        let stripped = strip_empty_properties(json!({
            "a": 1,
            "b": null,
            "nested": {"c": null, "d": "kept"}
        }));
        assert_eq!(stripped, json!({"a": 1, "nested": {"d": "kept"}}));
    }

    #[test]
    fn test_strip_passes_arrays_through() {
        let stripped = strip_empty_properties(json!({
            "items": [1, null, {"x": null}],
            "gone": null
        }));
        assert_eq!(stripped, json!({"items": [1, null, {"x": null}]}));
    }

    #[test]
    fn test_strip_keeps_empty_strings() {
        let stripped = strip_empty_properties(json!({"s": "", "n": null}));
        assert_eq!(stripped, json!({"s": ""}));
    }
}
