//! Raw (unannotated) patient documents.
//!
//! Stored patients and the master schema are plain JSON objects. Key order is
//! significant (it drives first-encountered tie-breaking), so `serde_json` is
//! built with `preserve_order` and [`Document`] iterates in insertion order.

use crate::constants::VALUE_KEY;
use serde_json::{Map, Value};

/// A plain JSON object keyed by field name.
pub type Document = Map<String, Value>;

/// Join a parent field path and a key with a dot (`""` + `temp` is `temp`).
pub fn join_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}

/// A value counts as empty when it is `null`, the empty string, or an empty list.
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Stringify a scalar for value-frequency bucketing.
///
/// Returns `None` for `null`, lists and objects, none of which produce a bucket.
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Returns the object if `value` is a nested structure rather than a leaf.
///
/// An object carrying a `value` key is an annotated leaf wrapper and therefore
/// not nested.
pub fn as_nested(value: &Value) -> Option<&Document> {
    value
        .as_object()
        .filter(|object| !object.contains_key(VALUE_KEY))
}

/// The payload of a leaf: a leaf wrapper's `value`, or the value itself.
pub fn leaf_value(value: &Value) -> &Value {
    match value {
        Value::Object(object) => object.get(VALUE_KEY).unwrap_or(value),
        other => other,
    }
}

/// Collect a JSON list into strings, stringifying non-string scalars.
pub fn string_list(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| items.iter().filter_map(scalar_to_string).collect())
        .unwrap_or_default()
}
