//! Ranking & suggestion builder.
//!
//! A ranking tells the form three things: in what order to show fields
//! (`sorted_fields`), which values to offer as one-click suggestions per field
//! name, and how often each field path was filled in (used for visibility).
//!
//! Rankings are never stored. They are recomputed from the current patient set
//! on every request.

use crate::config::RankingConfig;
use crate::document::{join_path, Document};
use crate::filter;
use crate::frequency::{Counts, FrequencyTables, ValueFrequencies};
use crate::node::Fields;
use std::collections::HashSet;

/// Field order, suggestions and fill statistics computed over a document set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RankingOutput {
    /// Field name -> up to `suggestion_count` values, best first.
    pub suggestions: Vec<(String, Vec<String>)>,
    /// Dotted field paths by descending presence, ties in first-encountered order.
    pub sorted_fields: Vec<String>,
    /// Dotted field path -> presence count.
    pub field_frequencies: Counts,
    /// Number of documents the statistics were computed over.
    pub match_count: usize,
}

impl RankingOutput {
    /// The result of a filtered ranking that matched nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// True for the no-match result; callers fall back to the global ranking.
    pub fn is_empty(&self) -> bool {
        self.match_count == 0
    }

    pub fn suggestions_for(&self, field: &str) -> Option<&[String]> {
        self.suggestions
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, values)| values.as_slice())
    }

    pub fn frequency(&self, path: &str) -> usize {
        self.field_frequencies.get(path)
    }

    /// Share of matched documents containing `path`, in percent.
    pub fn fill_percentage(&self, path: &str) -> f64 {
        if self.match_count == 0 {
            return 0.0;
        }
        self.frequency(path) as f64 / self.match_count as f64 * 100.0
    }

    /// Whether the field `key` under `parent_path` is shown without expanding
    /// its parent. Top-level fields and identifiers are always shown.
    pub fn is_visible(&self, parent_path: &str, key: &str, cfg: &RankingConfig) -> bool {
        if parent_path.is_empty() || cfg.is_reserved(key) {
            return true;
        }
        self.fill_percentage(&join_path(parent_path, key)) >= cfg.visibility_threshold_percent
    }

    /// Split `children` of the node at `parent_path` into shown and collapsed keys,
    /// keeping their current order.
    pub fn visible_children(
        &self,
        parent_path: &str,
        children: &Fields,
        cfg: &RankingConfig,
    ) -> Visibility {
        let mut visibility = Visibility::default();
        for key in children.keys() {
            if self.is_visible(parent_path, key, cfg) {
                visibility.visible.push(key.to_string());
            } else {
                visibility.hidden.push(key.to_string());
            }
        }
        visibility
    }
}

/// Child keys of one node split by the visibility threshold.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Visibility {
    pub visible: Vec<String>,
    pub hidden: Vec<String>,
}

impl From<RankingOutput> for api_shared::RankingRes {
    fn from(output: RankingOutput) -> Self {
        api_shared::RankingRes {
            suggestions: output.suggestions.into_iter().collect(),
            field_frequencies: output
                .field_frequencies
                .iter()
                .map(|(path, count)| (path.to_string(), count))
                .collect(),
            sorted_fields: output.sorted_fields,
            match_count: output.match_count,
        }
    }
}

/// Ranking over the whole patient set.
pub fn global_ranking(patients: &[Document], cfg: &RankingConfig) -> RankingOutput {
    let tables = FrequencyTables::scan(patients, cfg);

    let suggestions = tables
        .values
        .iter()
        .map(|(field, counts)| (field.to_string(), counts.top(cfg.suggestion_count)))
        .collect();

    tracing::debug!(
        patients = tables.documents,
        fields = tables.fields.len(),
        "computed global ranking"
    );

    RankingOutput {
        suggestions,
        sorted_fields: sorted_fields(&tables.fields),
        field_frequencies: tables.fields,
        match_count: tables.documents,
    }
}

/// Ranking over the patients agreeing with `context`, with suggestions
/// topped up from the global pool.
///
/// Returns [`RankingOutput::empty`] when no patient matches.
pub fn filtered_ranking(
    patients: &[Document],
    context: &Document,
    cfg: &RankingConfig,
) -> RankingOutput {
    let matched = filter::matching(patients, context, cfg);
    if matched.is_empty() {
        tracing::debug!(patients = patients.len(), "no patients match the context");
        return RankingOutput::empty();
    }

    let tables = FrequencyTables::scan(matched.iter().copied(), cfg);
    let global_values = FrequencyTables::scan_values(patients, cfg);
    let suggestions = backfilled_suggestions(&tables.values, &global_values, cfg.suggestion_count);

    tracing::debug!(
        patients = patients.len(),
        matched = tables.documents,
        "computed filtered ranking"
    );

    RankingOutput {
        suggestions,
        sorted_fields: sorted_fields(&tables.fields),
        field_frequencies: tables.fields,
        match_count: tables.documents,
    }
}

fn sorted_fields(fields: &Counts) -> Vec<String> {
    fields.ranked().into_iter().map(str::to_string).collect()
}

/// For every field seen in either table, the filtered top values followed by
/// global values not already offered, up to `count`.
fn backfilled_suggestions(
    filtered: &ValueFrequencies,
    global: &ValueFrequencies,
    count: usize,
) -> Vec<(String, Vec<String>)> {
    let mut seen = HashSet::new();
    let field_names = filtered
        .field_names()
        .chain(global.field_names())
        .filter(|name| seen.insert(*name));

    field_names
        .map(|field| {
            let mut values = filtered.field(field).map(|c| c.top(count)).unwrap_or_default();
            if let Some(pool) = global.field(field) {
                for candidate in pool.ranked() {
                    if values.len() >= count {
                        break;
                    }
                    if !values.iter().any(|v| v == candidate) {
                        values.push(candidate.to_string());
                    }
                }
            }
            (field.to_string(), values)
        })
        .collect()
}
