//! Tree annotator and reorderer.
//!
//! Builds the annotated in-progress tree the form edits, applies user edits to
//! it, and re-sequences it when a new field order arrives. All operations are
//! pure transforms over a [`Fields`] tree; nothing here touches storage.

use crate::config::RankingConfig;
use crate::constants::{
    CHECKED_KEY, ID_KEY, MANUALLY_TOGGLED_KEY, META_KEY, NEGATIVE_KEY, PATIENT_ID_KEY,
    POSITIVE_KEY, VALUE_KEY,
};
use crate::document::{is_empty_value, join_path, string_list, Document};
use crate::node::{Fields, Node};
use crate::ordering::{order_by_rank, FieldOrder};
use crate::{PatientError, PatientResult};
use medform_types::PatientId;
use serde_json::{Map, Value};

/// The two lists of a history field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryList {
    Positive,
    Negative,
}

impl HistoryList {
    pub fn other(self) -> Self {
        match self {
            HistoryList::Positive => HistoryList::Negative,
            HistoryList::Negative => HistoryList::Positive,
        }
    }
}

impl std::str::FromStr for HistoryList {
    type Err = PatientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            POSITIVE_KEY => Ok(HistoryList::Positive),
            NEGATIVE_KEY => Ok(HistoryList::Negative),
            other => Err(PatientError::InvalidInput(format!(
                "unknown history list {other:?}"
            ))),
        }
    }
}

fn ordered(
    mut entries: Vec<(String, Node)>,
    parent_path: &str,
    order: &FieldOrder,
    pinned: &[String],
) -> Fields {
    order_by_rank(&mut entries, |(key, _)| key.as_str(), parent_path, order, pinned);
    entries.into_iter().collect()
}

/// Blank tree for a new patient: every schema leaf unticked and empty.
pub fn from_schema(schema: &Document, order: &FieldOrder, cfg: &RankingConfig) -> Fields {
    fn walk(
        schema: &Document,
        parent_path: &str,
        order: &FieldOrder,
        cfg: &RankingConfig,
    ) -> Fields {
        let entries = schema
            .iter()
            .filter(|(key, _)| !cfg.is_reserved(key))
            .map(|(key, value)| {
                let node = match value {
                    Value::Object(_) if cfg.is_history(key) => Node::empty_history(),
                    Value::Object(nested) => {
                        Node::parent(walk(nested, &join_path(parent_path, key), order, cfg))
                    }
                    _ => Node::blank_leaf(),
                };
                (key.clone(), node)
            })
            .collect();
        ordered(entries, parent_path, order, &cfg.reserved_keys)
    }

    walk(schema, "", order, cfg)
}

/// A new patient draft: identifiers first, then the blank schema tree.
pub fn new_patient(
    id: &str,
    patient_id: &PatientId,
    schema: &Document,
    order: &FieldOrder,
    cfg: &RankingConfig,
) -> Fields {
    let mut root = Fields::new();
    root.insert(ID_KEY, Node::Verbatim(Value::String(id.to_string())));
    root.insert(
        PATIENT_ID_KEY,
        Node::Verbatim(Value::String(patient_id.as_str().to_string())),
    );
    for (key, node) in from_schema(schema, order, cfg) {
        root.insert(key, node);
    }
    root
}

/// Annotate a stored document for editing.
///
/// Raw leaves are ticked when non-empty. Subtrees already carrying `_meta`
/// wrappers keep their flags; only missing flags are defaulted.
pub fn from_stored(document: &Document, order: &FieldOrder, cfg: &RankingConfig) -> Fields {
    annotate_object(document, "", order, cfg)
}

fn annotate_object(
    object: &Document,
    parent_path: &str,
    order: &FieldOrder,
    cfg: &RankingConfig,
) -> Fields {
    let entries = object
        .iter()
        .filter(|(key, _)| key.as_str() != META_KEY)
        .map(|(key, value)| {
            let node = if cfg.is_reserved(key) {
                Node::Verbatim(value.clone())
            } else {
                annotate_value(key, value, &join_path(parent_path, key), order, cfg)
            };
            (key.clone(), node)
        })
        .collect();
    ordered(entries, parent_path, order, &cfg.reserved_keys)
}

fn meta_flag(object: &Map<String, Value>, flag: &str) -> Option<bool> {
    object
        .get(META_KEY)
        .and_then(Value::as_object)
        .and_then(|meta| meta.get(flag))
        .and_then(Value::as_bool)
}

fn is_history_shape(object: &Map<String, Value>) -> bool {
    object
        .keys()
        .all(|k| k == POSITIVE_KEY || k == NEGATIVE_KEY || k == META_KEY)
}

/// A history list stored either raw (`[..]`) or wrapped (`{"value": [..]}`).
fn history_items(entry: Option<&Value>) -> Vec<String> {
    match entry {
        Some(Value::Object(wrapper)) => {
            wrapper.get(VALUE_KEY).map(string_list).unwrap_or_default()
        }
        Some(other) => string_list(other),
        None => Vec::new(),
    }
}

fn annotate_value(
    key: &str,
    value: &Value,
    path: &str,
    order: &FieldOrder,
    cfg: &RankingConfig,
) -> Node {
    let object = match value {
        Value::Object(object) => object,
        Value::Null => return Node::blank_leaf(),
        scalar => return Node::auto_leaf(scalar.clone()),
    };

    let manually_toggled = meta_flag(object, MANUALLY_TOGGLED_KEY).unwrap_or(false);

    if let Some(inner) = object.get(VALUE_KEY) {
        let value = if inner.is_null() {
            Value::String(String::new())
        } else {
            inner.clone()
        };
        let checked = match object.get(META_KEY) {
            Some(_) => meta_flag(object, CHECKED_KEY).unwrap_or(false),
            None => !is_empty_value(&value),
        };
        return Node::Leaf {
            checked,
            manually_toggled,
            value,
        };
    }

    if cfg.is_history(key) && is_history_shape(object) {
        return Node::History {
            manually_toggled,
            positive: history_items(object.get(POSITIVE_KEY)),
            negative: history_items(object.get(NEGATIVE_KEY)),
        };
    }

    Node::Parent {
        manually_toggled,
        children: annotate_object(object, path, order, cfg),
    }
}

fn invalid_path(path: &str) -> PatientError {
    PatientError::InvalidPath(path.to_string())
}

/// The node at dotted `path`.
pub fn node_at<'a>(root: &'a Fields, path: &str) -> Option<&'a Node> {
    let mut segments = path.split('.');
    let mut node = root.get(segments.next()?)?;
    for segment in segments {
        node = node.children()?.get(segment)?;
    }
    Some(node)
}

fn node_at_mut<'a>(root: &'a mut Fields, path: &str) -> PatientResult<&'a mut Node> {
    let mut segments = path.split('.');
    let first = segments.next().unwrap_or_default();
    let mut node = root.get_mut(first).ok_or_else(|| invalid_path(path))?;
    for segment in segments {
        node = node
            .children_mut()
            .and_then(|children| children.get_mut(segment))
            .ok_or_else(|| invalid_path(path))?;
    }
    Ok(node)
}

/// Replace the subtree at dotted `path` with `replacement`.
///
/// An empty path replaces the whole tree, which requires a parent node. The
/// parent of `path` must exist; the last segment is inserted if missing.
pub fn apply_edit(root: &mut Fields, path: &str, replacement: Node) -> PatientResult<()> {
    if path.is_empty() {
        return match replacement {
            Node::Parent { children, .. } => {
                *root = children;
                Ok(())
            }
            _ => Err(invalid_path(path)),
        };
    }

    let (siblings, key) = match path.rsplit_once('.') {
        Some((parent_path, key)) => (
            node_at_mut(root, parent_path)?
                .children_mut()
                .ok_or_else(|| invalid_path(path))?,
            key,
        ),
        None => (root, path),
    };
    siblings.insert(key, replacement);
    Ok(())
}

/// Flip a leaf's checkbox. The leaf stops following its value from then on.
pub fn toggle_checked(root: &mut Fields, path: &str) -> PatientResult<()> {
    match node_at_mut(root, path)? {
        Node::Leaf {
            checked,
            manually_toggled,
            ..
        } => {
            *checked = !*checked;
            *manually_toggled = true;
            Ok(())
        }
        _ => Err(invalid_path(path)),
    }
}

/// Assign a leaf's value; an auto leaf's checkbox follows whether it is empty.
pub fn set_value(root: &mut Fields, path: &str, new_value: Value) -> PatientResult<()> {
    match node_at_mut(root, path)? {
        Node::Leaf {
            checked,
            manually_toggled,
            value,
        } => {
            if !*manually_toggled {
                *checked = !is_empty_value(&new_value);
            }
            *value = new_value;
            Ok(())
        }
        _ => Err(invalid_path(path)),
    }
}

/// Click `item` in one list of the history field at `path`.
///
/// A click on an item already in `list` removes it. Otherwise the item is
/// appended to `list` and removed from the other one.
pub fn toggle_history_item(
    root: &mut Fields,
    path: &str,
    item: &str,
    list: HistoryList,
) -> PatientResult<()> {
    if item.trim().is_empty() {
        return Err(PatientError::InvalidInput(
            "history item cannot be empty".into(),
        ));
    }

    let Node::History {
        positive, negative, ..
    } = node_at_mut(root, path)?
    else {
        return Err(invalid_path(path));
    };

    let (clicked, other) = match list {
        HistoryList::Positive => (positive, negative),
        HistoryList::Negative => (negative, positive),
    };

    if let Some(index) = clicked.iter().position(|existing| existing == item) {
        clicked.remove(index);
    } else {
        clicked.push(item.to_string());
        other.retain(|existing| existing != item);
    }
    Ok(())
}

/// Re-sequence every node's children by `order`, pinned keys first.
///
/// Values and flags are left untouched.
pub fn reorder(root: &mut Fields, order: &FieldOrder, cfg: &RankingConfig) {
    fn walk(fields: &mut Fields, parent_path: &str, order: &FieldOrder, pinned: &[String]) {
        order_by_rank(
            fields.entries_mut(),
            |(key, _)| key.as_str(),
            parent_path,
            order,
            pinned,
        );
        for (key, node) in fields.iter_mut() {
            if let Some(children) = node.children_mut() {
                walk(children, &join_path(parent_path, key), order, pinned);
            }
        }
    }

    walk(root, "", order, cfg.pinned());
}
