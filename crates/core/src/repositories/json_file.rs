//! Durable patient store backed by a single JSON database file.
//!
//! ## Storage Layout
//!
//! ```text
//! <patient_data_dir>/
//!   db.json    # {"patients": [ ... ], "schema": { ... }}
//! ```
//!
//! The file is read once when the repository is opened and cached behind a
//! lock. Every mutation rewrites the whole file: the new contents go to a
//! sibling temporary file which is then renamed over `db.json`, so a failed
//! write never leaves a truncated database behind.

use super::{has_patient_id, upsert_into, PatientRepository, UpsertOutcome};
use crate::config::CoreConfig;
use crate::document::Document;
use crate::{PatientError, PatientResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

#[derive(Debug, Default, Deserialize)]
struct RawDatabase {
    #[serde(default)]
    patients: Vec<Value>,
    #[serde(default)]
    schema: Document,
}

#[derive(Debug, Default, Serialize)]
struct Database {
    patients: Vec<Document>,
    schema: Document,
}

impl From<RawDatabase> for Database {
    fn from(raw: RawDatabase) -> Self {
        let patients = raw
            .patients
            .into_iter()
            .enumerate()
            .filter_map(|(index, entry)| match entry {
                Value::Object(document) => Some(document),
                other => {
                    tracing::warn!(
                        index,
                        kind = json_kind(&other),
                        "skipping stored patient that is not a JSON object"
                    );
                    None
                }
            })
            .collect();

        Self {
            patients,
            schema: raw.schema,
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A [`PatientRepository`] persisted to `<patient_data_dir>/db.json`.
#[derive(Debug)]
pub struct JsonFileRepository {
    path: PathBuf,
    state: RwLock<Database>,
}

impl JsonFileRepository {
    /// Open the database configured in `cfg`.
    pub fn from_config(cfg: &CoreConfig) -> PatientResult<Self> {
        Self::open(cfg.database_path())
    }

    /// Open the database at `path`. A missing file is an empty database; it is
    /// created on the first write.
    pub fn open(path: impl Into<PathBuf>) -> PatientResult<Self> {
        let path = path.into();
        let database = match fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => Database::default(),
            Ok(contents) => serde_json::from_str::<RawDatabase>(&contents)
                .map_err(PatientError::Deserialization)?
                .into(),
            Err(e) if e.kind() == ErrorKind::NotFound => Database::default(),
            Err(e) => return Err(PatientError::FileRead(e)),
        };

        tracing::debug!(
            path = %path.display(),
            patients = database.patients.len(),
            "opened patient database"
        );

        Ok(Self {
            path,
            state: RwLock::new(database),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, database: &Database) -> PatientResult<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(PatientError::StorageDirCreation)?;
        }

        let contents =
            serde_json::to_string_pretty(database).map_err(PatientError::Serialization)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, contents).map_err(PatientError::FileWrite)?;
        fs::rename(&tmp, &self.path).map_err(PatientError::FileWrite)
    }

    /// Apply `change` to the cached database and write it out. The cache is
    /// only updated once the file write succeeded.
    fn mutate<T>(&self, change: impl FnOnce(&mut Database) -> T) -> PatientResult<T> {
        let mut state = self.state.write().map_err(poisoned)?;
        let mut next = Database {
            patients: state.patients.clone(),
            schema: state.schema.clone(),
        };
        let result = change(&mut next);
        self.persist(&next)?;
        *state = next;
        Ok(result)
    }
}

fn poisoned<T>(_: T) -> PatientError {
    PatientError::StoreUnavailable("patient database lock poisoned".into())
}

impl PatientRepository for JsonFileRepository {
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
        self.mutate(|db| {
            db.schema = schema;
            upsert_into(&mut db.patients, patient_id, document)
        })
    }

    fn replace_all_with_schema(
        &self,
        documents: Vec<Document>,
        schema: Document,
    ) -> PatientResult<()> {
        self.mutate(|db| {
            db.patients = documents;
            db.schema = schema;
        })
    }

    fn schema(&self) -> PatientResult<Document> {
        Ok(self.state.read().map_err(poisoned)?.schema.clone())
    }
}
