//! The annotated in-progress patient tree.
//!
//! Every field of the form is a [`Node`]. The wire representation used by the
//! browser client wraps each node in a `_meta` object:
//!
//! ```text
//! leaf     {"_meta": {"checked": true, "manuallyToggled": false}, "value": "38"}
//! parent   {"_meta": {"manuallyToggled": false}, "bp": {..leaf..}, "hr": {..leaf..}}
//! history  {"_meta": {"manuallyToggled": false},
//!           "positive": {"_meta": {..}, "value": ["asthma"]},
//!           "negative": {"_meta": {..}, "value": []}}
//! ```
//!
//! Identifier keys (`_id`, `patient_id`) are carried as [`Node::Verbatim`].

use crate::constants::{META_KEY, NEGATIVE_KEY, POSITIVE_KEY, VALUE_KEY};
use crate::document::is_empty_value;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// An identifier preserved exactly as stored.
    Verbatim(Value),
    /// A directly editable scalar plus its checkbox state.
    Leaf {
        checked: bool,
        manually_toggled: bool,
        value: Value,
    },
    /// Named child fields, no value of its own.
    Parent {
        manually_toggled: bool,
        children: Fields,
    },
    /// A history field: free-text items split into positive and negative findings.
    History {
        manually_toggled: bool,
        positive: Vec<String>,
        negative: Vec<String>,
    },
}

impl Node {
    /// An unticked, empty leaf as produced for a new patient.
    pub fn blank_leaf() -> Self {
        Node::Leaf {
            checked: false,
            manually_toggled: false,
            value: Value::String(String::new()),
        }
    }

    /// A leaf whose checkbox is derived from whether `value` is non-empty.
    pub fn auto_leaf(value: Value) -> Self {
        Node::Leaf {
            checked: !is_empty_value(&value),
            manually_toggled: false,
            value,
        }
    }

    pub fn parent(children: Fields) -> Self {
        Node::Parent {
            manually_toggled: false,
            children,
        }
    }

    pub fn empty_history() -> Self {
        Node::History {
            manually_toggled: false,
            positive: Vec::new(),
            negative: Vec::new(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf { .. })
    }

    pub fn children(&self) -> Option<&Fields> {
        match self {
            Node::Parent { children, .. } => Some(children),
            _ => None,
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut Fields> {
        match self {
            Node::Parent { children, .. } => Some(children),
            _ => None,
        }
    }

    /// The wire representation of this node.
    pub fn to_value(&self) -> Value {
        // Serialising into a `Value` cannot fail: every key is a string.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Ordered child fields of a parent node (and the root of a patient tree).
///
/// Insertion order is the display order; reordering rewrites it in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields {
    entries: Vec<(String, Node)>,
}

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn get(&self, key: &str) -> Option<&Node> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, n)| n)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Node> {
        self.entries
            .iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, n)| n)
    }

    /// Insert or replace `key`. A replaced key keeps its position.
    pub fn insert(&mut self, key: impl Into<String>, node: Node) -> Option<Node> {
        let key = key.into();
        match self.get_mut(&key) {
            Some(existing) => Some(std::mem::replace(existing, node)),
            None => {
                self.entries.push((key, node));
                None
            }
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Node> {
        let position = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(position).1)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.entries.iter().map(|(k, n)| (k.as_str(), n))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut Node)> {
        self.entries.iter_mut().map(|(k, n)| (k.as_str(), n))
    }

    pub(crate) fn entries_mut(&mut self) -> &mut Vec<(String, Node)> {
        &mut self.entries
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl FromIterator<(String, Node)> for Fields {
    fn from_iter<I: IntoIterator<Item = (String, Node)>>(iter: I) -> Self {
        let mut fields = Fields::new();
        for (key, node) in iter {
            fields.insert(key, node);
        }
        fields
    }
}

impl IntoIterator for Fields {
    type Item = (String, Node);
    type IntoIter = std::vec::IntoIter<(String, Node)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

#[derive(serde::Serialize)]
struct Meta {
    #[serde(rename = "checked", skip_serializing_if = "Option::is_none")]
    checked: Option<bool>,
    #[serde(rename = "manuallyToggled")]
    manually_toggled: bool,
}

/// A history list. It has no toggle of its own; `checked` follows non-emptiness.
struct ListLeaf<'a>(&'a [String]);

impl Serialize for ListLeaf<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry(
            META_KEY,
            &Meta {
                checked: Some(!self.0.is_empty()),
                manually_toggled: false,
            },
        )?;
        map.serialize_entry(VALUE_KEY, self.0)?;
        map.end()
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Node::Verbatim(value) => value.serialize(serializer),
            Node::Leaf {
                checked,
                manually_toggled,
                value,
            } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry(
                    META_KEY,
                    &Meta {
                        checked: Some(*checked),
                        manually_toggled: *manually_toggled,
                    },
                )?;
                map.serialize_entry(VALUE_KEY, value)?;
                map.end()
            }
            Node::Parent {
                manually_toggled,
                children,
            } => {
                let mut map = serializer.serialize_map(Some(children.len() + 1))?;
                map.serialize_entry(
                    META_KEY,
                    &Meta {
                        checked: None,
                        manually_toggled: *manually_toggled,
                    },
                )?;
                for (key, child) in children.iter() {
                    map.serialize_entry(key, child)?;
                }
                map.end()
            }
            Node::History {
                manually_toggled,
                positive,
                negative,
            } => {
                let mut map = serializer.serialize_map(Some(3))?;
                map.serialize_entry(
                    META_KEY,
                    &Meta {
                        checked: None,
                        manually_toggled: *manually_toggled,
                    },
                )?;
                map.serialize_entry(POSITIVE_KEY, &ListLeaf(positive))?;
                map.serialize_entry(NEGATIVE_KEY, &ListLeaf(negative))?;
                map.end()
            }
        }
    }
}

impl Serialize for Fields {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, node) in &self.entries {
            map.serialize_entry(key, node)?;
        }
        map.end()
    }
}
