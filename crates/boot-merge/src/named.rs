//! Merge-by-identity for arrays of objects.

use serde_json::Value;

use crate::engine::merge_value;
use crate::error::MergeError;

/// Identity field used when none is configured.
pub const DEFAULT_IDENTITY_KEY: &str = "name";

/// Merge `incoming` into a copy of `base`, matching items by `identity_key`.
///
/// Base items keep their order. An incoming item whose identity matches a
/// base item is deep-merged into the first such item; anything else is
/// appended in incoming order.
pub fn merge_named_items(
    base: &[Value],
    incoming: &[Value],
    identity_key: &str,
) -> Result<Vec<Value>, MergeError> {
    let mut result = base.to_vec();

    for item in incoming {
        let matched = identity_of(item, identity_key).and_then(|id| {
            result
                .iter()
                .position(|candidate| identity_of(candidate, identity_key) == Some(id))
        });

        match matched {
            Some(ix) => merge_value(&mut result[ix], item, &format!("[{}]", ix))?,
            None => result.push(item.clone()),
        }
    }

    Ok(result)
}

/// Identity value of `item`, if it has a usable one.
///
/// Missing, null, false, zero and empty-string values never identify an
/// item, and neither do objects or arrays.
pub fn identity_of<'a>(item: &'a Value, identity_key: &str) -> Option<&'a Value> {
    item.get(identity_key)
        .filter(|id| is_truthy(id) && !id.is_array() && !id.is_object())
}

/// Truthiness of a configuration value.
///
/// Null, false, zero and the empty string are falsy; everything else,
/// including empty objects and arrays, is truthy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
