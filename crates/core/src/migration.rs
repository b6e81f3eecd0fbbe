//! Migration of history fields stored in the legacy per-item shape.
//!
//! Older records stored a history field as `{"asthma": "1", "dm": "negative"}`.
//! The current shape is `{"positive": [...], "negative": [...]}`. Values are
//! matched case-insensitively; anything that is neither positive nor negative
//! is dropped.

use crate::config::RankingConfig;
use crate::constants::{LEGACY_NEGATIVE_VALUES, LEGACY_POSITIVE_VALUES, NEGATIVE_KEY, POSITIVE_KEY};
use crate::document::{scalar_to_string, Document};
use serde_json::Value;

/// Outcome of migrating a set of patient documents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub patients_changed: usize,
    pub fields_migrated: usize,
}

fn is_current_shape(history: &Document) -> bool {
    !history.is_empty()
        && history
            .iter()
            .all(|(k, v)| (k == POSITIVE_KEY || k == NEGATIVE_KEY) && v.is_array())
}

fn classify(value: &Value) -> Option<&'static str> {
    let lowered = scalar_to_string(value)?.to_lowercase();
    if LEGACY_POSITIVE_VALUES.contains(&lowered.as_str()) {
        Some(POSITIVE_KEY)
    } else if LEGACY_NEGATIVE_VALUES.contains(&lowered.as_str()) {
        Some(NEGATIVE_KEY)
    } else {
        None
    }
}

/// Rewrite legacy history fields of one patient in place.
///
/// Returns the number of fields rewritten. Fields already in the current shape
/// are left alone.
pub fn migrate_history(patient: &mut Document, cfg: &RankingConfig) -> usize {
    let mut migrated = 0;
    for field in &cfg.history_fields {
        let Some(Value::Object(legacy)) = patient.get(field) else {
            continue;
        };
        if is_current_shape(legacy) {
            continue;
        }

        let mut positive = Vec::new();
        let mut negative = Vec::new();
        for (item, value) in legacy {
            match classify(value) {
                Some(POSITIVE_KEY) => positive.push(Value::String(item.clone())),
                Some(_) => negative.push(Value::String(item.clone())),
                None => {
                    tracing::debug!(
                        field = %field,
                        item = %item,
                        "dropping unclassified history item"
                    );
                }
            }
        }

        let mut lists = Document::new();
        lists.insert(POSITIVE_KEY.into(), Value::Array(positive));
        lists.insert(NEGATIVE_KEY.into(), Value::Array(negative));
        patient.insert(field.clone(), Value::Object(lists));
        migrated += 1;
    }
    migrated
}

/// Migrate every patient, reporting what changed.
pub fn migrate_all(patients: &mut [Document], cfg: &RankingConfig) -> MigrationReport {
    let mut report = MigrationReport::default();
    for patient in patients.iter_mut() {
        let fields = migrate_history(patient, cfg);
        if fields > 0 {
            report.patients_changed += 1;
            report.fields_migrated += fields;
        }
    }
    report
}
