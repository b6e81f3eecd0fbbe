//! Constants used throughout the Medform core crate.
//!
//! Key names and defaults live here so traversal code never carries string
//! literals of its own; the configurable subset is surfaced via
//! [`RankingConfig`](crate::config::RankingConfig).

/// Default directory for patient data storage when no explicit directory is configured.
pub const DEFAULT_PATIENT_DATA_DIR: &str = "patient_data";

/// Filename of the JSON database holding every patient document and the master schema.
pub const DATABASE_FILENAME: &str = "db.json";

/// Opaque storage identifier key.
pub const ID_KEY: &str = "_id";

/// User-facing patient identifier key.
pub const PATIENT_ID_KEY: &str = "patient_id";

/// Annotation wrapper key used by the form's wire format.
pub const META_KEY: &str = "_meta";

/// Leaf payload key inside an annotation wrapper.
pub const VALUE_KEY: &str = "value";

/// Annotation flag: the checkbox state of a leaf.
pub const CHECKED_KEY: &str = "checked";

/// Annotation flag: the checkbox state was set explicitly by the user.
pub const MANUALLY_TOGGLED_KEY: &str = "manuallyToggled";

/// Positive sub-list of a history field.
pub const POSITIVE_KEY: &str = "positive";

/// Negative sub-list of a history field.
pub const NEGATIVE_KEY: &str = "negative";

/// Keys never annotated, counted or merged into the schema.
pub const RESERVED_KEYS: &[&str] = &[ID_KEY, PATIENT_ID_KEY];

/// Keys the context filter never treats as a criterion.
pub const FILTER_IGNORED_KEYS: &[&str] = &[
    ID_KEY,
    PATIENT_ID_KEY,
    "file_number",
    "national_code",
    META_KEY,
    CHECKED_KEY,
    MANUALLY_TOGGLED_KEY,
];

/// Keys a reorder always places first, regardless of rank.
pub const PINNED_KEYS: &[&str] = &[ID_KEY, PATIENT_ID_KEY, "file_number", "national_code"];

/// Fields stored as `{positive: [...], negative: [...]}` lists.
pub const HISTORY_FIELDS: &[&str] = &["pmh", "dh", "sh"];

/// Number of value suggestions offered per field.
pub const DEFAULT_SUGGESTION_COUNT: usize = 4;

/// Minimum fill percentage for a nested field to be shown without expanding.
pub const DEFAULT_VISIBILITY_THRESHOLD_PERCENT: f64 = 15.0;

/// Legacy history values migrated into the positive list.
pub const LEGACY_POSITIVE_VALUES: &[&str] = &["1", "positive"];

/// Legacy history values migrated into the negative list.
pub const LEGACY_NEGATIVE_VALUES: &[&str] = &["0", "negative"];
