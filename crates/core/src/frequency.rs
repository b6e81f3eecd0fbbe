//! Frequency statistics over a set of patient documents.
//!
//! Two independent tallies are produced:
//!
//! - **field presence**: dotted path -> number of occurrences of exactly that
//!   path. A parent path is counted once per occurrence of the parent itself;
//!   it does not accumulate its children's counts.
//! - **value frequency**: bare leaf field name -> stringified value -> count.
//!   `labs.wbc` and `followup.labs.wbc` share the `wbc` bucket.
//!
//! Both tallies remember the order in which keys were first encountered, which
//! is the tie-breaker for every ranking built on top of them. Children are
//! visited before their parent path is recorded.

use crate::config::RankingConfig;
use crate::document::{as_nested, join_path, leaf_value, scalar_to_string, Document};
use std::collections::HashMap;

/// Insertion-ordered string counter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Counts {
    entries: Vec<(String, usize)>,
    index: HashMap<String, usize>,
}

impl Counts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&mut self, key: &str) {
        match self.index.get(key) {
            Some(&position) => self.entries[position].1 += 1,
            None => {
                self.index.insert(key.to_string(), self.entries.len());
                self.entries.push((key.to_string(), 1));
            }
        }
    }

    pub fn get(&self, key: &str) -> usize {
        self.index
            .get(key)
            .map(|&position| self.entries[position].1)
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in first-encountered order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.entries.iter().map(|(k, c)| (k.as_str(), *c))
    }

    /// Keys by descending count; equal counts keep first-encountered order.
    pub fn ranked(&self) -> Vec<&str> {
        let mut ranked: Vec<&(String, usize)> = self.entries.iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked.into_iter().map(|(k, _)| k.as_str()).collect()
    }

    /// The `n` highest-ranked keys.
    pub fn top(&self, n: usize) -> Vec<String> {
        self.ranked()
            .into_iter()
            .take(n)
            .map(str::to_string)
            .collect()
    }
}

/// Per-field-name value counters, in first-encountered field order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueFrequencies {
    fields: Vec<(String, Counts)>,
    index: HashMap<String, usize>,
}

impl ValueFrequencies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, field: &str, value: &str) {
        let position = match self.index.get(field) {
            Some(&position) => position,
            None => {
                self.index.insert(field.to_string(), self.fields.len());
                self.fields.push((field.to_string(), Counts::new()));
                self.fields.len() - 1
            }
        };
        self.fields[position].1.increment(value);
    }

    pub fn field(&self, name: &str) -> Option<&Counts> {
        self.index.get(name).map(|&position| &self.fields[position].1)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Counts)> {
        self.fields.iter().map(|(name, counts)| (name.as_str(), counts))
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Both tallies over one document set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrequencyTables {
    pub fields: Counts,
    pub values: ValueFrequencies,
    pub documents: usize,
}

impl FrequencyTables {
    /// Scan every document once, accumulating both tallies.
    pub fn scan<'a, I>(documents: I, cfg: &RankingConfig) -> Self
    where
        I: IntoIterator<Item = &'a Document>,
    {
        let mut tables = Self::default();
        for document in documents {
            count_field_presence(document, "", &mut tables.fields, cfg);
            count_values(document, &mut tables.values, cfg);
            tables.documents += 1;
        }
        tables
    }

    /// Only the value tally, for global backfill.
    pub fn scan_values<'a, I>(documents: I, cfg: &RankingConfig) -> ValueFrequencies
    where
        I: IntoIterator<Item = &'a Document>,
    {
        let mut values = ValueFrequencies::new();
        for document in documents {
            count_values(document, &mut values, cfg);
        }
        values
    }
}

/// Add one increment per visited key to its dotted path.
pub fn count_field_presence(
    document: &Document,
    prefix: &str,
    frequencies: &mut Counts,
    cfg: &RankingConfig,
) {
    for (key, value) in document {
        if cfg.is_reserved(key) {
            continue;
        }
        let path = join_path(prefix, key);
        if let Some(nested) = as_nested(value) {
            count_field_presence(nested, &path, frequencies, cfg);
        }
        frequencies.increment(&path);
    }
}

/// Add one increment per scalar leaf to its bare field name and value.
///
/// Leaf wrappers count their `value`.
pub fn count_values(document: &Document, frequencies: &mut ValueFrequencies, cfg: &RankingConfig) {
    for (key, value) in document {
        if cfg.is_reserved(key) {
            continue;
        }
        match as_nested(value) {
            Some(nested) => count_values(nested, frequencies, cfg),
            None => {
                if let Some(stringified) = scalar_to_string(leaf_value(value)) {
                    frequencies.record(key, &stringified);
                }
            }
        }
    }
}
