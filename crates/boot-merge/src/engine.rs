//! Deep merge engine.

use serde_json::{Map, Value};

use crate::error::MergeError;
use crate::named::{merge_named_items, DEFAULT_IDENTITY_KEY};

/// Merge engine with a fixed identity key for named collections.
///
/// Domain-specific merge strategies hold one of these by value and defer
/// to it for everything that is not domain-specific.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeEngine {
    identity_key: String,
}

impl Default for MergeEngine {
    fn default() -> Self {
        Self {
            identity_key: DEFAULT_IDENTITY_KEY.to_string(),
        }
    }
}

impl MergeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `key` instead of `name` to match items in named collections.
    pub fn with_identity_key(key: impl Into<String>) -> Self {
        Self {
            identity_key: key.into(),
        }
    }

    pub fn identity_key(&self) -> &str {
        &self.identity_key
    }

    /// Merge `incoming` into `target` in place.
    pub fn merge(&self, target: &mut Value, incoming: &Value) -> Result<(), MergeError> {
        merge(target, incoming)
    }

    /// Merge two object maps, reporting errors under `key_prefix`.
    pub fn merge_objects(
        &self,
        target: &mut Map<String, Value>,
        incoming: &Map<String, Value>,
        key_prefix: &str,
    ) -> Result<(), MergeError> {
        merge_objects(target, incoming, key_prefix)
    }

    /// Merge two named collections using this engine's identity key.
    pub fn merge_named_items(
        &self,
        base: &[Value],
        incoming: &[Value],
    ) -> Result<Vec<Value>, MergeError> {
        merge_named_items(base, incoming, &self.identity_key)
    }
}

/// Merge `incoming` into `target` in place.
///
/// On error the merge stops where it failed; values merged before the
/// failure stay applied.
pub fn merge(target: &mut Value, incoming: &Value) -> Result<(), MergeError> {
    merge_value(target, incoming, "")
}

/// Merge every key of `incoming` into `target`.
pub fn merge_objects(
    target: &mut Map<String, Value>,
    incoming: &Map<String, Value>,
    key_prefix: &str,
) -> Result<(), MergeError> {
    for (key, new_value) in incoming {
        let full_key = if key_prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", key_prefix, key)
        };
        let slot = target.entry(key.clone()).or_insert(Value::Null);
        merge_value(slot, new_value, &full_key)?;
    }
    Ok(())
}

/// Merge a single value into `origin`, checking type compatibility first.
pub fn merge_value(origin: &mut Value, new_value: &Value, key_path: &str) -> Result<(), MergeError> {
    if !has_compatible_type(origin, new_value) {
        return Err(MergeError::IncompatibleTypes {
            key_path: key_path.to_string(),
        });
    }

    match (origin, new_value) {
        (Value::Array(target), Value::Array(incoming)) => merge_arrays(target, incoming, key_path),
        (Value::Object(target), Value::Object(incoming)) => {
            merge_objects(target, incoming, key_path)
        }
        // Scalars, and null over objects
        (slot, value) => {
            *slot = value.clone();
            Ok(())
        }
    }
}

/// Whether `new_value` may be merged over `origin`.
///
/// - null origin accepts anything
/// - array origin accepts only arrays
/// - object origin accepts objects and null
/// - scalar origin accepts scalars only
pub fn has_compatible_type(origin: &Value, new_value: &Value) -> bool {
    match origin {
        Value::Null => true,
        Value::Array(_) => new_value.is_array(),
        Value::Object(_) => new_value.is_object() || new_value.is_null(),
        _ => !new_value.is_object() && !new_value.is_array() && !new_value.is_null(),
    }
}

fn merge_arrays(target: &mut [Value], incoming: &[Value], key_path: &str) -> Result<(), MergeError> {
    if target.len() != incoming.len() {
        return Err(MergeError::ArrayLengthMismatch {
            key_path: key_path.to_string(),
            target_len: target.len(),
            incoming_len: incoming.len(),
        });
    }

    for (ix, (origin, new_value)) in target.iter_mut().zip(incoming).enumerate() {
        merge_value(origin, new_value, &format!("{}[{}]", key_path, ix))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalar_override() {
        let mut target = json!({"port": 3000});
        merge(&mut target, &json!({"port": 4000})).unwrap();
        assert_eq!(target["port"], 4000);
    }

    #[test]
    fn test_object_deep_merge() {
        let mut target = json!({
            "db": {
                "host": "localhost",
                "port": 5432
            }
        });
        merge(&mut target, &json!({"db": {"host": "db.internal"}})).unwrap();

        assert_eq!(target["db"]["host"], "db.internal");
        assert_eq!(target["db"]["port"], 5432);
    }

    #[test]
    fn test_add_new_key() {
        let mut target = json!({"a": 1});
        merge(&mut target, &json!({"b": {"c": [1, 2]}})).unwrap();

        assert_eq!(target["a"], 1);
        assert_eq!(target["b"]["c"], json!([1, 2]));
    }

    #[test]
    fn test_new_keys_appended_in_order() {
        let mut target = json!({"z": 1, "a": 2});
        merge(&mut target, &json!({"m": 3, "b": 4})).unwrap();

        let keys: Vec<&String> = target.as_object().unwrap().keys().collect();
        assert_eq!(keys, ["z", "a", "m", "b"]);
    }

    #[test]
    fn test_null_overrides_object() {
        let mut target = json!({"cache": {"ttl": 10}});
        merge(&mut target, &json!({"cache": null})).unwrap();
        assert!(target["cache"].is_null());
    }

    #[test]
    fn test_null_over_scalar_rejected() {
        let mut target = json!({"port": 3000});
        let err = merge(&mut target, &json!({"port": null})).unwrap_err();
        assert_eq!(
            err,
            MergeError::IncompatibleTypes {
                key_path: "port".to_string()
            }
        );
        assert_eq!(target["port"], 3000);
    }

    #[test]
    fn test_null_origin_accepts_anything() {
        let mut target = json!({"value": null});
        merge(&mut target, &json!({"value": [1, 2, 3]})).unwrap();
        assert_eq!(target["value"], json!([1, 2, 3]));
    }

    #[test]
    fn test_array_elementwise_merge() {
        let mut target = json!({
            "servers": [
                {"host": "a", "port": 1},
                {"host": "b", "port": 2}
            ]
        });
        merge(
            &mut target,
            &json!({"servers": [{"port": 10}, {"host": "c"}]}),
        )
        .unwrap();

        assert_eq!(
            target["servers"],
            json!([{"host": "a", "port": 10}, {"host": "c", "port": 2}])
        );
    }

    #[test]
    fn test_array_length_mismatch() {
        let mut target = json!({"list": [1, 2, 3]});
        let err = merge(&mut target, &json!({"list": [1, 2]})).unwrap_err();

        assert_eq!(
            err,
            MergeError::ArrayLengthMismatch {
                key_path: "list".to_string(),
                target_len: 3,
                incoming_len: 2,
            }
        );
    }

    #[test]
    fn test_array_length_mismatch_ignores_content() {
        let mut target = json!({"list": [{"a": 1}]});
        assert!(merge(&mut target, &json!({"list": []})).is_err());

        let mut target = json!({"list": []});
        assert!(merge(&mut target, &json!({"list": [null]})).is_err());
    }

    #[test]
    fn test_incompatible_object_over_scalar() {
        let mut target = json!({"a": {"b": 1}});
        let err = merge(&mut target, &json!({"a": {"b": {"c": 2}}})).unwrap_err();
        assert_eq!(
            err,
            MergeError::IncompatibleTypes {
                key_path: "a.b".to_string()
            }
        );
    }

    #[test]
    fn test_incompatible_scalar_over_array() {
        let mut target = json!({"a": [1]});
        let err = merge(&mut target, &json!({"a": "x"})).unwrap_err();
        assert_eq!(err.key_path(), "a");
    }

    #[test]
    fn test_incompatible_array_over_object() {
        let mut target = json!({"a": {"b": 1}});
        assert!(merge(&mut target, &json!({"a": [1]})).is_err());
    }

    #[test]
    fn test_null_does_not_override_array() {
        let mut target = json!({"a": [1]});
        assert!(merge(&mut target, &json!({"a": null})).is_err());
    }

    #[test]
    fn test_error_path_inside_array() {
        let mut target = json!({"a": {"b": [1, {"c": "x"}, 3]}});
        let err = merge(&mut target, &json!({"a": {"b": [1, {"c": {}}, 3]}})).unwrap_err();
        assert_eq!(err.key_path(), "a.b[1].c");
    }

    #[test]
    fn test_partial_mutation_is_kept_on_error() {
        let mut target = json!({"a": 1, "b": [1]});
        let result = merge(&mut target, &json!({"a": 2, "b": {"x": 1}}));

        assert!(result.is_err());
        assert_eq!(target["a"], 2);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let base = json!({
            "name": "app",
            "rest": {"limit": 10, "paths": ["/a", "/b"]},
            "flags": [true, false]
        });
        let overlay = json!({
            "rest": {"limit": 20, "paths": ["/c", null]},
            "flags": [false, false],
            "extra": {"k": "v"}
        });

        let mut once = base.clone();
        merge(&mut once, &overlay).unwrap();
        let mut twice = once.clone();
        merge(&mut twice, &overlay).unwrap();

        assert_eq!(once, twice);
    }

    #[test]
    fn test_layers_fold_left_to_right() {
        let layers = [
            json!({"port": 3000, "host": "0.0.0.0", "db": {"pool": 5}}),
            json!({"port": 3001}),
            json!({"db": {"pool": 10}}),
            json!({"port": 8080}),
        ];

        let mut merged = layers[0].clone();
        for layer in &layers[1..] {
            merge(&mut merged, layer).unwrap();
        }

        assert_eq!(merged["port"], 8080);
        assert_eq!(merged["host"], "0.0.0.0");
        assert_eq!(merged["db"]["pool"], 10);
    }

    #[test]
    fn test_engine_uses_identity_key() {
        let engine = MergeEngine::with_identity_key("id");
        let merged = engine
            .merge_named_items(&[json!({"id": 1, "v": "a"})], &[json!({"id": 1, "v": "b"})])
            .unwrap();
        assert_eq!(merged, vec![json!({"id": 1, "v": "b"})]);
        assert_eq!(MergeEngine::new().identity_key(), "name");
    }
}
