//! Core runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into core services. Request handling never reads process-wide environment variables;
//! binaries parse them through the `*_from_env_value` helpers below and build a [`CoreConfig`].

use crate::constants::{
    DATABASE_FILENAME, DEFAULT_PATIENT_DATA_DIR, DEFAULT_SUGGESTION_COUNT,
    DEFAULT_VISIBILITY_THRESHOLD_PERCENT, FILTER_IGNORED_KEYS, HISTORY_FIELDS, PINNED_KEYS,
    RESERVED_KEYS,
};
use crate::{PatientError, PatientResult};
use std::path::{Path, PathBuf};

/// Named constants consumed by the ranking engine and the tree annotator.
#[derive(Clone, Debug, PartialEq)]
pub struct RankingConfig {
    /// Maximum number of value suggestions per field.
    pub suggestion_count: usize,
    /// Fill percentage at or above which a nested field is visible by default.
    pub visibility_threshold_percent: f64,
    /// Identifier keys: preserved verbatim, never annotated, counted or merged.
    pub reserved_keys: Vec<String>,
    /// Keys skipped when a document is used as a context filter.
    pub filter_ignored_keys: Vec<String>,
    /// Keys a reorder always emits first.
    pub pinned_keys: Vec<String>,
    /// Fields holding positive/negative string lists.
    pub history_fields: Vec<String>,
}

impl Default for RankingConfig {
    fn default() -> Self {
        fn owned(keys: &[&str]) -> Vec<String> {
            keys.iter().map(|k| k.to_string()).collect()
        }

        Self {
            suggestion_count: DEFAULT_SUGGESTION_COUNT,
            visibility_threshold_percent: DEFAULT_VISIBILITY_THRESHOLD_PERCENT,
            reserved_keys: owned(RESERVED_KEYS),
            filter_ignored_keys: owned(FILTER_IGNORED_KEYS),
            pinned_keys: owned(PINNED_KEYS),
            history_fields: owned(HISTORY_FIELDS),
        }
    }
}

impl RankingConfig {
    /// Build a config with the default key lists and the given tunables.
    pub fn new(suggestion_count: usize, visibility_threshold_percent: f64) -> PatientResult<Self> {
        let cfg = Self {
            suggestion_count,
            visibility_threshold_percent,
            ..Self::default()
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> PatientResult<()> {
        if self.suggestion_count == 0 {
            return Err(PatientError::InvalidInput(
                "suggestion count must be at least 1".into(),
            ));
        }
        if !(0.0..=100.0).contains(&self.visibility_threshold_percent) {
            return Err(PatientError::InvalidInput(
                "visibility threshold must be between 0 and 100".into(),
            ));
        }
        Ok(())
    }

    pub fn is_reserved(&self, key: &str) -> bool {
        self.reserved_keys.iter().any(|k| k == key)
    }

    pub fn is_filter_ignored(&self, key: &str) -> bool {
        self.filter_ignored_keys.iter().any(|k| k == key)
    }

    pub fn is_history(&self, key: &str) -> bool {
        self.history_fields.iter().any(|k| k == key)
    }

    pub fn pinned(&self) -> &[String] {
        &self.pinned_keys
    }
}

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    patient_data_dir: PathBuf,
    ranking: RankingConfig,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    pub fn new(patient_data_dir: PathBuf, ranking: RankingConfig) -> PatientResult<Self> {
        if patient_data_dir.as_os_str().is_empty() {
            return Err(PatientError::InvalidInput(
                "patient data directory cannot be empty".into(),
            ));
        }
        ranking.validate()?;

        Ok(Self {
            patient_data_dir,
            ranking,
        })
    }

    /// Build a config from raw environment values (`PATIENT_DATA_DIR`,
    /// `MEDFORM_SUGGESTION_COUNT`, `MEDFORM_VISIBILITY_THRESHOLD`).
    ///
    /// Missing or blank values fall back to their defaults.
    pub fn from_env_values(
        patient_data_dir: Option<String>,
        suggestion_count: Option<String>,
        visibility_threshold: Option<String>,
    ) -> PatientResult<Self> {
        let patient_data_dir = patient_data_dir
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_PATIENT_DATA_DIR.to_string());
        let ranking = RankingConfig::new(
            suggestion_count_from_env_value(suggestion_count)?,
            visibility_threshold_from_env_value(visibility_threshold)?,
        )?;
        Self::new(PathBuf::from(patient_data_dir), ranking)
    }

    pub fn patient_data_dir(&self) -> &Path {
        &self.patient_data_dir
    }

    /// Location of the JSON database file.
    pub fn database_path(&self) -> PathBuf {
        self.patient_data_dir.join(DATABASE_FILENAME)
    }

    pub fn ranking(&self) -> &RankingConfig {
        &self.ranking
    }
}

/// Parse the suggestion count from an optional string value.
///
/// If `value` is `None` or empty/whitespace, returns the default of 4.
pub fn suggestion_count_from_env_value(value: Option<String>) -> PatientResult<usize> {
    match value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        None => Ok(DEFAULT_SUGGESTION_COUNT),
        Some(v) => v.parse::<usize>().map_err(|e| {
            PatientError::InvalidInput(format!("invalid suggestion count {v:?}: {e}"))
        }),
    }
}

/// Parse the visibility threshold (percent) from an optional string value.
///
/// If `value` is `None` or empty/whitespace, returns the default of 15%.
pub fn visibility_threshold_from_env_value(value: Option<String>) -> PatientResult<f64> {
    match value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        None => Ok(DEFAULT_VISIBILITY_THRESHOLD_PERCENT),
        Some(v) => v.parse::<f64>().map_err(|e| {
            PatientError::InvalidInput(format!("invalid visibility threshold {v:?}: {e}"))
        }),
    }
}
