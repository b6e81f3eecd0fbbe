//! Ordering children by a ranked field list.
//!
//! Initialising a tree from the schema, initialising it from a stored document
//! and reordering a live tree all sort siblings the same way:
//!
//! 1. pinned keys first, in their existing relative order;
//! 2. keys whose full dotted path appears in the ranking, by rank;
//! 3. everything else, in its existing relative order.

use crate::document::join_path;
use std::collections::HashMap;

/// Lookup table from dotted field path to its position in a ranking.
#[derive(Debug, Clone, Default)]
pub struct FieldOrder {
    ranks: HashMap<String, usize>,
}

impl FieldOrder {
    /// Build the lookup from `sorted_fields`; the first occurrence of a path wins.
    pub fn new<S: AsRef<str>>(sorted_fields: &[S]) -> Self {
        let mut ranks = HashMap::with_capacity(sorted_fields.len());
        for (index, path) in sorted_fields.iter().enumerate() {
            ranks.entry(path.as_ref().to_string()).or_insert(index);
        }
        Self { ranks }
    }

    pub fn rank(&self, path: &str) -> Option<usize> {
        self.ranks.get(path).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.ranks.is_empty()
    }
}

/// Stable-sort sibling `items` whose keys live under `parent_path`.
pub fn order_by_rank<T, F>(
    items: &mut [T],
    key_of: F,
    parent_path: &str,
    order: &FieldOrder,
    pinned: &[String],
) where
    F: Fn(&T) -> &str,
{
    items.sort_by_cached_key(|item| {
        let key = key_of(item);
        if pinned.iter().any(|p| p == key) {
            return (0u8, 0usize);
        }
        match order.rank(&join_path(parent_path, key)) {
            Some(rank) => (1, rank),
            None => (2, 0),
        }
    });
}
