//! Master schema maintenance.
//!
//! The master schema is the union of every field path ever saved, with blank
//! (`""`) leaves. It only ever grows: merging a patient adds paths and never
//! removes one. When a key changes shape between saves, the shape observed last
//! wins for that key. An object carrying a `value` key is an annotated leaf
//! wrapper and contributes a leaf, not a subtree.

use crate::config::RankingConfig;
use crate::document::{as_nested, join_path, Document};
use serde_json::Value;

/// Fold `patient`'s structure into `schema`.
pub fn merge(schema: &mut Document, patient: &Document, cfg: &RankingConfig) {
    for (key, patient_value) in patient {
        if cfg.is_reserved(key) {
            continue;
        }

        match as_nested(patient_value) {
            Some(nested) => {
                let slot = schema
                    .entry(key.clone())
                    .or_insert_with(|| Value::Object(Document::new()));
                if !slot.is_object() {
                    *slot = Value::Object(Document::new());
                }
                if let Value::Object(child_schema) = slot {
                    merge(child_schema, nested, cfg);
                }
            }
            None => {
                let needs_placeholder = schema.get(key).map_or(true, Value::is_object);
                if needs_placeholder {
                    schema.insert(key.clone(), Value::String(String::new()));
                }
            }
        }
    }
}

/// Every dotted leaf and parent path present in `schema`.
pub fn field_paths(schema: &Document) -> Vec<String> {
    fn walk(doc: &Document, prefix: &str, out: &mut Vec<String>) {
        for (key, value) in doc {
            let path = join_path(prefix, key);
            out.push(path.clone());
            if let Value::Object(nested) = value {
                walk(nested, &path, out);
            }
        }
    }

    let mut out = Vec::new();
    walk(schema, "", &mut out);
    out
}
