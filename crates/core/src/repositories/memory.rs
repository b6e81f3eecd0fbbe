//! Process-local patient store.

use super::{has_patient_id, upsert_into, PatientRepository, UpsertOutcome};
use crate::document::Document;
use crate::{PatientError, PatientResult};
use std::sync::RwLock;

#[derive(Debug, Default)]
struct State {
    patients: Vec<Document>,
    schema: Document,
}

/// A [`PatientRepository`] that keeps everything in memory.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    state: RwLock<State>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-populated with `patients` and an empty schema.
    pub fn with_patients(patients: Vec<Document>) -> Self {
        Self {
            state: RwLock::new(State {
                patients,
                schema: Document::new(),
            }),
        }
    }
}

fn poisoned<T>(_: T) -> PatientError {
    PatientError::StoreUnavailable("in-memory store lock poisoned".into())
}

impl PatientRepository for InMemoryRepository {
    fn all(&self) -> PatientResult<Vec<Document>> {
        Ok(self.state.read().map_err(poisoned)?.patients.clone())
    }

    fn get(&self, patient_id: &str) -> PatientResult<Option<Document>> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state
            .patients
            .iter()
            .find(|p| has_patient_id(p, patient_id))
            .cloned())
    }

    fn upsert_with_schema(
        &self,
        patient_id: &str,
        document: Document,
        schema: Document,
    ) -> PatientResult<UpsertOutcome> {
        let mut state = self.state.write().map_err(poisoned)?;
        state.schema = schema;
        Ok(upsert_into(&mut state.patients, patient_id, document))
    }

    fn replace_all_with_schema(
        &self,
        documents: Vec<Document>,
        schema: Document,
    ) -> PatientResult<()> {
        let mut state = self.state.write().map_err(poisoned)?;
        state.patients = documents;
        state.schema = schema;
        Ok(())
    }

    fn schema(&self) -> PatientResult<Document> {
        Ok(self.state.read().map_err(poisoned)?.schema.clone())
    }
}
