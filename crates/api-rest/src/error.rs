//! Mapping of core failures onto HTTP responses.

use api_shared::ErrorRes;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use medform_core::PatientError;

/// A failed request, rendered as `{"error": "..."}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    NothingToSave(String),
    #[error("Internal error")]
    Internal,
}

impl ApiError {
    /// Log `err` against the failing `operation` and classify it.
    ///
    /// Store failures are reported with a generic message; their detail only
    /// goes to the log.
    pub fn from_core(operation: &str, err: PatientError) -> Self {
        tracing::error!("{} error: {:?}", operation, err);
        match err {
            e if e.is_validation() => ApiError::BadRequest(e.to_string()),
            e @ PatientError::NotFound(_) => ApiError::NotFound(e.to_string()),
            e @ PatientError::NothingToSave => ApiError::NothingToSave(e.to_string()),
            _ => ApiError::Internal,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::NothingToSave(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorRes {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_errors_map_to_statuses() {
        let cases = [
            (
                PatientError::InvalidInput("patient_id is required".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                PatientError::InvalidPatientId(medform_core::TextError::Empty),
                StatusCode::BAD_REQUEST,
            ),
            (
                PatientError::NotFound("P-404".into()),
                StatusCode::NOT_FOUND,
            ),
            (PatientError::NothingToSave, StatusCode::UNPROCESSABLE_ENTITY),
            (
                PatientError::StoreUnavailable("lock poisoned".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(ApiError::from_core("Test", err).status(), expected);
        }
    }

    #[test]
    fn test_internal_errors_hide_detail() {
        let err = ApiError::from_core(
            "Test",
            PatientError::StoreUnavailable("secret path".into()),
        );
        assert_eq!(err.to_string(), "Internal error");
    }
}
