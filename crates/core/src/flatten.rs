//! Save-time flattening of an annotated tree back into a plain document.

use crate::config::RankingConfig;
use crate::constants::{NEGATIVE_KEY, POSITIVE_KEY};
use crate::document::{is_empty_value, Document};
use crate::node::{Fields, Node};
use crate::{PatientError, PatientResult};
use serde_json::Value;

/// Strip annotations and drop everything that should not be persisted.
///
/// Identifiers are kept verbatim. Leaves survive only when ticked and
/// non-empty, history fields only when one of their lists has items, and
/// parents only when something beneath them survived.
pub fn flatten(root: &Fields) -> Document {
    let mut out = Document::new();
    for (key, node) in root.iter() {
        let kept = match node {
            Node::Verbatim(value) => Some(value.clone()),
            Node::Leaf { checked, value, .. } => {
                (*checked && !is_empty_value(value)).then(|| value.clone())
            }
            Node::History {
                positive, negative, ..
            } => (!positive.is_empty() || !negative.is_empty()).then(|| {
                let mut lists = Document::new();
                lists.insert(POSITIVE_KEY.into(), Value::from(positive.clone()));
                lists.insert(NEGATIVE_KEY.into(), Value::from(negative.clone()));
                Value::Object(lists)
            }),
            Node::Parent { children, .. } => {
                let nested = flatten(children);
                (!nested.is_empty()).then_some(Value::Object(nested))
            }
        };
        if let Some(value) = kept {
            out.insert(key.to_string(), value);
        }
    }
    out
}

/// True when `document` holds anything besides identifiers.
pub fn has_content(document: &Document, cfg: &RankingConfig) -> bool {
    document.keys().any(|key| !cfg.is_reserved(key))
}

/// Flatten `root` for persistence, refusing a tree with nothing to save.
pub fn flatten_for_save(root: &Fields, cfg: &RankingConfig) -> PatientResult<Document> {
    let flat = flatten(root);
    if !has_content(&flat, cfg) {
        return Err(PatientError::NothingToSave);
    }
    Ok(flat)
}
