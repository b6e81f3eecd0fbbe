//! Context filter: does a stored patient agree with every filled-in field of
//! an in-progress record?
//!
//! The filter document may be flat (as stored) or annotated (as held by the
//! form). Annotated leaves are unwrapped to their `value`; annotation keys and
//! identifiers are never criteria. An empty criterion never excludes a patient.

use crate::config::RankingConfig;
use crate::document::{as_nested, is_empty_value, leaf_value, Document};
use serde_json::Value;

/// Whether `entry` constrains anything. A nested entry counts only when some
/// criterion beneath it is non-empty.
fn has_criteria(entry: &Value, cfg: &RankingConfig) -> bool {
    let criterion = leaf_value(entry);
    if is_empty_value(criterion) {
        return false;
    }
    match as_nested(criterion) {
        Some(nested) => nested
            .iter()
            .any(|(key, child)| !cfg.is_filter_ignored(key) && has_criteria(child, cfg)),
        None => true,
    }
}

/// True when `patient` satisfies every non-empty criterion in `filter`.
pub fn matches(patient: &Document, filter: &Document, cfg: &RankingConfig) -> bool {
    filter.iter().all(|(key, entry)| {
        if cfg.is_filter_ignored(key) {
            return true;
        }

        if !has_criteria(entry, cfg) {
            return true;
        }

        let criterion = leaf_value(entry);

        match as_nested(criterion) {
            Some(nested_filter) => patient
                .get(key)
                .and_then(as_nested)
                .is_some_and(|nested_patient| matches(nested_patient, nested_filter, cfg)),
            None => patient.get(key) == Some(criterion),
        }
    })
}

/// The subset of `patients` matching `filter`, in store order.
pub fn matching<'a>(
    patients: &'a [Document],
    filter: &Document,
    cfg: &RankingConfig,
) -> Vec<&'a Document> {
    patients
        .iter()
        .filter(|patient| matches(patient, filter, cfg))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().expect("object")
    }

    fn temperatures() -> Vec<Document> {
        vec![
            doc(json!({"patient_id": "P-001", "temp": "38"})),
            doc(json!({"patient_id": "P-002", "temp": "38"})),
            doc(json!({"patient_id": "P-003", "temp": "36"})),
        ]
    }

    #[test]
    fn test_annotated_leaf_filter_selects_equal_values() {
        let cfg = RankingConfig::default();
        let patients = temperatures();
        let filter = doc(json!({"temp": {"value": "38", "checked": true}}));

        let matched = matching(&patients, &filter, &cfg);

        assert_eq!(matched.len(), 2);
        assert!(matched.iter().all(|p| p["temp"] == json!("38")));
    }

    #[test]
    fn test_empty_criteria_match_every_patient() {
        let cfg = RankingConfig::default();
        let filters = [
            json!({}),
            json!({"temp": ""}),
            json!({"temp": null, "hr": {"value": ""}}),
            json!({"vitals": {"bp": {"_meta": {"checked": false}, "value": ""}}}),
            json!({"pmh": {"positive": {"value": []}, "negative": {"value": []}}}),
        ];

        for filter in filters {
            let filter = doc(filter);
            for patient in temperatures() {
                assert!(matches(&patient, &filter, &cfg), "{filter:?} excluded {patient:?}");
            }
        }
    }

    #[test]
    fn test_all_empty_nested_criteria_do_not_require_the_parent() {
        let cfg = RankingConfig::default();
        let patient = doc(json!({"patient_id": "P-001", "temp": "38"}));
        let draft = doc(json!({
            "_id": "patient_1",
            "patient_id": "P-002",
            "vitals": {
                "_meta": {"manuallyToggled": false},
                "bp": {"_meta": {"checked": false, "manuallyToggled": false}, "value": ""},
                "cbc": {"_meta": {"manuallyToggled": false}, "wbc": {"value": ""}}
            },
            "pmh": {
                "_meta": {"manuallyToggled": false},
                "positive": {"_meta": {"checked": false}, "value": []},
                "negative": {"_meta": {"checked": false}, "value": []}
            },
            "temp": {"_meta": {"checked": true}, "value": "38"}
        }));

        assert!(matches(&patient, &draft, &cfg));

        let mut with_criterion = draft.clone();
        with_criterion["vitals"]["bp"]["value"] = json!("120/80");
        assert!(!matches(&patient, &with_criterion, &cfg));
    }

    #[test]
    fn test_identifiers_and_annotations_are_not_criteria() {
        let cfg = RankingConfig::default();
        let patient = doc(json!({"patient_id": "P-001", "temp": "38"}));
        let filter = doc(json!({
            "_id": "patient_9",
            "patient_id": "P-999",
            "file_number": "77",
            "national_code": "123",
            "_meta": {"manuallyToggled": true},
            "temp": "38"
        }));

        assert!(matches(&patient, &filter, &cfg));
    }

    #[test]
    fn test_nested_criteria_recurse() {
        let cfg = RankingConfig::default();
        let patient = doc(json!({"vitals": {"bp": "120/80", "hr": "80"}}));

        let agreeing = doc(json!({
            "vitals": {"_meta": {"manuallyToggled": false}, "bp": {"value": "120/80"}}
        }));
        let disagreeing = doc(json!({"vitals": {"hr": {"value": "90"}}}));

        assert!(matches(&patient, &agreeing, &cfg));
        assert!(!matches(&patient, &disagreeing, &cfg));
    }

    #[test]
    fn test_nested_criterion_requires_nested_patient_value() {
        let cfg = RankingConfig::default();
        let filter = doc(json!({"vitals": {"bp": "120/80"}}));

        assert!(!matches(&doc(json!({"vitals": "normal"})), &filter, &cfg));
        assert!(!matches(&doc(json!({"temp": "38"})), &filter, &cfg));
    }

    #[test]
    fn test_scalar_comparison_is_strict() {
        let cfg = RankingConfig::default();
        let patient = doc(json!({"hr": "80"}));

        assert!(!matches(&patient, &doc(json!({"hr": 80})), &cfg));
        assert!(!matches(&doc(json!({})), &doc(json!({"hr": "80"})), &cfg));
    }

    #[test]
    fn test_history_lists_compare_by_content() {
        let cfg = RankingConfig::default();
        let patient = doc(json!({"pmh": {"positive": ["asthma"], "negative": []}}));
        let filter = doc(json!({
            "pmh": {
                "_meta": {"manuallyToggled": false},
                "positive": {"_meta": {"checked": true}, "value": ["asthma"]},
                "negative": {"_meta": {"checked": false}, "value": []}
            }
        }));

        assert!(matches(&patient, &filter, &cfg));
    }
}
