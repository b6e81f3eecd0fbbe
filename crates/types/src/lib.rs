//! Validated primitive types shared across the Medform crates.

/// Longest patient identifier accepted on save.
pub const MAX_PATIENT_ID_LEN: usize = 128;

/// Errors that can occur when creating validated text types.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TextError {
    /// The input text was empty or contained only whitespace
    #[error("Text cannot be empty")]
    Empty,
    /// The input text exceeded the permitted length
    #[error("Text exceeds maximum length of {0} characters")]
    TooLong(usize),
    /// The input text contained a control character
    #[error("Text cannot contain control characters")]
    ControlCharacter,
}

/// The user-facing identifier a patient document is keyed by (e.g. `P-001`).
///
/// The identifier is kept verbatim: stored documents are matched on the exact
/// string the clinician saved, so no trimming happens here.
/// Whitespace-only identifiers, control characters and identifiers longer than
/// [`MAX_PATIENT_ID_LEN`] are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PatientId(String);

impl PatientId {
    /// Validates `input` as a patient identifier.
    pub fn parse(input: impl Into<String>) -> Result<Self, TextError> {
        let input = input.into();
        if input.trim().is_empty() {
            return Err(TextError::Empty);
        }
        if input.chars().count() > MAX_PATIENT_ID_LEN {
            return Err(TextError::TooLong(MAX_PATIENT_ID_LEN));
        }
        if input.chars().any(char::is_control) {
            return Err(TextError::ControlCharacter);
        }
        Ok(Self(input))
    }

    /// Formats the `index`-th patient identifier of a registry (1-based).
    ///
    /// The sequence number is zero-padded to three digits: `P-001`, `P-042`, `P-1000`.
    pub fn sequential(index: usize) -> Self {
        Self(format!("P-{index:03}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PatientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PatientId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for PatientId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for PatientId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        PatientId::parse(s).map_err(serde::de::Error::custom)
    }
}
