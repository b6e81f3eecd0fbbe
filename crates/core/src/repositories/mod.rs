//! Patient document storage.
//!
//! The ranking engine and the service layer only ever reach storage through
//! [`PatientRepository`]. Two implementations are provided:
//!
//! - [`JsonFileRepository`]: the durable store, a single JSON database file
//!   holding every patient document and the master schema.
//! - [`InMemoryRepository`]: a process-local store for tests and tooling.

pub mod json_file;
pub mod memory;

pub use json_file::JsonFileRepository;
pub use memory::InMemoryRepository;

use crate::constants::PATIENT_ID_KEY;
use crate::document::Document;
use crate::PatientResult;
use serde_json::Value;

/// Whether an upsert added a new document or replaced an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Replaced,
}

/// Storage for patient documents keyed by `patient_id`, plus the master schema.
pub trait PatientRepository: Send + Sync {
    /// Every stored patient document, in insertion order.
    fn all(&self) -> PatientResult<Vec<Document>>;

    /// The document whose `patient_id` equals `patient_id`, if any.
    fn get(&self, patient_id: &str) -> PatientResult<Option<Document>>;

    /// Insert `document`, or replace the stored document with the same
    /// `patient_id` in place, and store `schema` as the master schema.
    ///
    /// Both land in one write: on error neither is changed. Last write wins.
    fn upsert_with_schema(
        &self,
        patient_id: &str,
        document: Document,
        schema: Document,
    ) -> PatientResult<UpsertOutcome>;

    /// Replace every stored patient document and the master schema in one write.
    fn replace_all_with_schema(
        &self,
        documents: Vec<Document>,
        schema: Document,
    ) -> PatientResult<()>;

    /// The current master schema.
    fn schema(&self) -> PatientResult<Document>;
}

/// True when `document` is keyed by `patient_id`.
pub(crate) fn has_patient_id(document: &Document, patient_id: &str) -> bool {
    matches!(document.get(PATIENT_ID_KEY), Some(Value::String(id)) if id == patient_id)
}

/// Shared upsert over an in-memory document list.
pub(crate) fn upsert_into(
    documents: &mut Vec<Document>,
    patient_id: &str,
    document: Document,
) -> UpsertOutcome {
    match documents
        .iter_mut()
        .find(|existing| has_patient_id(existing, patient_id))
    {
        Some(existing) => {
            *existing = document;
            UpsertOutcome::Replaced
        }
        None => {
            documents.push(document);
            UpsertOutcome::Created
        }
    }
}
