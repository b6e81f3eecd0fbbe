#[derive(Debug, thiserror::Error)]
pub enum PatientError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid patient_id: {0}")]
    InvalidPatientId(#[from] medform_types::TextError),
    #[error("patient not found: {0}")]
    NotFound(String),
    #[error("no checked, non-empty fields to save")]
    NothingToSave,
    #[error("path does not resolve to an editable node: {0}")]
    InvalidPath(String),

    #[error("failed to create storage directory: {0}")]
    StorageDirCreation(std::io::Error),
    #[error("failed to write patient store: {0}")]
    FileWrite(std::io::Error),
    #[error("failed to read patient store: {0}")]
    FileRead(std::io::Error),
    #[error("failed to serialize patient store: {0}")]
    Serialization(serde_json::Error),
    #[error("failed to deserialize patient store: {0}")]
    Deserialization(serde_json::Error),
    #[error("patient store unavailable: {0}")]
    StoreUnavailable(String),
}

impl PatientError {
    /// True for failures caused by the caller's input rather than the store.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            PatientError::InvalidInput(_)
                | PatientError::InvalidPatientId(_)
                | PatientError::InvalidPath(_)
        )
    }
}

pub type PatientResult<T> = std::result::Result<T, PatientError>;
