//! Wire types exchanged with the form UI.
//!
//! Field names follow the JSON the browser client already speaks, hence the
//! camelCase renames on the ranking payload.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

/// Health check response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

/// One entry of the patient picker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PatientSummary {
    /// User-facing identifier the document is keyed by.
    pub patient_id: String,
    /// Opaque storage identifier (`_id`) if the document carries one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// Field order, value suggestions and fill statistics for the form.
///
/// An all-empty value (`matchCount == 0`) returned from the filtered endpoint
/// tells the caller to fall back to the global ranking.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RankingRes {
    /// Field name -> most frequent values, best first.
    pub suggestions: BTreeMap<String, Vec<String>>,
    /// Dotted field paths, most frequent first.
    pub sorted_fields: Vec<String>,
    /// Dotted field path -> number of documents containing it.
    pub field_frequencies: BTreeMap<String, usize>,
    /// Number of documents the statistics were computed over.
    pub match_count: usize,
}

/// Error body returned by every failing endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ErrorRes {
    pub error: String,
}
