//! # API REST
//!
//! REST API implementation for Medform.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON serialization, CORS)
//!
//! Uses `api-shared` for common types and `medform-core` for every data operation.

#![warn(rust_2018_idioms)]

pub mod error;

pub use error::ApiError;

use api_shared::{HealthRes, HealthService, PatientSummary, RankingRes};
use axum::{
    extract::{Path, State},
    response::Json,
    routing::{get, post},
    Router,
};
use medform_core::PatientService;
use serde_json::Value;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Application state for the REST API server
///
/// Contains shared state that needs to be accessible to all request handlers,
/// including the PatientService instance for data operations.
#[derive(Clone)]
pub struct AppState {
    patient_service: PatientService,
}

impl AppState {
    pub fn new(patient_service: PatientService) -> Self {
        Self { patient_service }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        get_schema,
        list_patients,
        get_patient,
        save_patient,
        global_suggestions,
        filtered_suggestions,
    ),
    components(schemas(HealthRes, PatientSummary, RankingRes, api_shared::ErrorRes))
)]
pub struct ApiDoc;

/// Build the REST router with Swagger UI and permissive CORS.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/schema", get(get_schema))
        .route("/api/patients", get(list_patients).post(save_patient))
        .route("/api/patients/:patient_id", get(get_patient))
        .route("/api/suggestions", get(global_suggestions))
        .route("/api/suggestions/filtered", post(filtered_suggestions))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind `addr` and serve `state` until the server fails.
pub async fn serve(addr: &str, state: AppState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("-- Medform REST API listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the REST API
///
/// This endpoint is used for monitoring and load balancer health checks.
#[axum::debug_handler]
async fn health(State(_state): State<AppState>) -> Json<HealthRes> {
    Json(HealthService::check_health())
}

#[utoipa::path(
    get,
    path = "/api/schema",
    responses(
        (status = 200, description = "Master schema: every field ever saved, with blank leaves"),
        (status = 500, description = "Internal server error", body = api_shared::ErrorRes)
    )
)]
/// Current master schema
#[axum::debug_handler]
async fn get_schema(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let schema = state
        .patient_service
        .schema()
        .map_err(|e| ApiError::from_core("Get schema", e))?;
    Ok(Json(Value::Object(schema)))
}

#[utoipa::path(
    get,
    path = "/api/patients",
    responses(
        (status = 200, description = "Summary of every stored patient", body = [PatientSummary]),
        (status = 500, description = "Internal server error", body = api_shared::ErrorRes)
    )
)]
/// List all patients in the system
///
/// # Errors
/// Returns `500 Internal Server Error` if the store cannot be read.
#[axum::debug_handler]
async fn list_patients(
    State(state): State<AppState>,
) -> Result<Json<Vec<PatientSummary>>, ApiError> {
    let patients = state
        .patient_service
        .list_patients()
        .map_err(|e| ApiError::from_core("List patients", e))?;
    Ok(Json(patients))
}

#[utoipa::path(
    get,
    path = "/api/patients/{patient_id}",
    params(("patient_id" = String, Path, description = "User-facing patient identifier")),
    responses(
        (status = 200, description = "Stored (unannotated) patient document"),
        (status = 404, description = "No such patient", body = api_shared::ErrorRes),
        (status = 500, description = "Internal server error", body = api_shared::ErrorRes)
    )
)]
/// Fetch one stored patient document
#[axum::debug_handler]
async fn get_patient(
    State(state): State<AppState>,
    Path(patient_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let patient = state
        .patient_service
        .get_patient(&patient_id)
        .map_err(|e| ApiError::from_core("Get patient", e))?;
    Ok(Json(Value::Object(patient)))
}

#[utoipa::path(
    post,
    path = "/api/patients",
    responses(
        (status = 200, description = "Stored patient document, echoed back"),
        (status = 400, description = "Missing or invalid patient_id", body = api_shared::ErrorRes),
        (status = 500, description = "Internal server error", body = api_shared::ErrorRes)
    )
)]
/// Create or replace a patient document
///
/// The body is a flattened patient document. It replaces any stored document
/// with the same `patient_id` and is merged into the master schema.
///
/// # Errors
/// Returns `400 Bad Request` if `patient_id` is missing or blank, and
/// `500 Internal Server Error` if the store cannot be written.
#[axum::debug_handler]
async fn save_patient(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let stored = state
        .patient_service
        .save_patient(body)
        .map_err(|e| ApiError::from_core("Save patient", e))?;
    Ok(Json(Value::Object(stored)))
}

#[utoipa::path(
    get,
    path = "/api/suggestions",
    responses(
        (status = 200, description = "Ranking over every stored patient", body = RankingRes),
        (status = 500, description = "Internal server error", body = api_shared::ErrorRes)
    )
)]
/// Global field order and value suggestions
#[axum::debug_handler]
async fn global_suggestions(State(state): State<AppState>) -> Result<Json<RankingRes>, ApiError> {
    let ranking = state
        .patient_service
        .global_ranking()
        .map_err(|e| ApiError::from_core("Global suggestions", e))?;
    Ok(Json(ranking.into()))
}

#[utoipa::path(
    post,
    path = "/api/suggestions/filtered",
    responses(
        (status = 200, description = "Ranking over similar patients; matchCount 0 when none match", body = RankingRes),
        (status = 400, description = "Body is not a JSON object", body = api_shared::ErrorRes),
        (status = 500, description = "Internal server error", body = api_shared::ErrorRes)
    )
)]
/// Field order and value suggestions from patients similar to the body
///
/// The body is the in-progress record, flat or annotated. When no stored
/// patient matches, every field of the response is empty and the caller
/// should fall back to `/api/suggestions`.
#[axum::debug_handler]
async fn filtered_suggestions(
    State(state): State<AppState>,
    Json(context): Json<Value>,
) -> Result<Json<RankingRes>, ApiError> {
    let ranking = state
        .patient_service
        .filtered_ranking(&context)
        .map_err(|e| ApiError::from_core("Filtered suggestions", e))?;
    Ok(Json(ranking.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use medform_core::{CoreConfig, InMemoryRepository, RankingConfig};
    use serde_json::json;
    use std::path::PathBuf;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn test_app() -> Router {
        let cfg = Arc::new(
            CoreConfig::new(PathBuf::from("unused"), RankingConfig::default())
                .expect("CoreConfig::new should succeed"),
        );
        let service = PatientService::new(cfg, Arc::new(InMemoryRepository::new()));
        router(AppState::new(service))
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .body(Body::empty())
            .expect("request should build")
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request should build")
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let resp = app.clone().oneshot(req).await.expect("router should respond");
        let status = resp.status();
        let body = resp
            .into_body()
            .collect()
            .await
            .expect("body should be readable")
            .to_bytes();
        let json = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).expect("body should be JSON")
        };
        (status, json)
    }

    #[tokio::test]
    async fn test_health_returns_ok() {
        let app = test_app();
        let (status, body) = send(&app, get_request("/health")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], json!(true));
    }

    #[tokio::test]
    async fn test_save_then_read_schema_and_patient() {
        let app = test_app();

        let (status, echoed) = send(
            &app,
            post_json(
                "/api/patients",
                json!({"patient_id": "P-001", "vitals": {"bp": {"checked": true, "value": "120/80"}}}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(echoed["patient_id"], json!("P-001"));

        let (status, schema) = send(&app, get_request("/api/schema")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(schema["vitals"]["bp"], json!(""));

        let (status, patients) = send(&app, get_request("/api/patients")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(patients, json!([{"patient_id": "P-001"}]));

        let (status, patient) = send(&app, get_request("/api/patients/P-001")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(patient["vitals"]["bp"]["value"], json!("120/80"));
    }

    #[tokio::test]
    async fn test_save_without_patient_id_is_bad_request() {
        let app = test_app();

        let (status, body) = send(&app, post_json("/api/patients", json!({"temp": "38"}))).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], json!("invalid input: patient_id is required"));

        let (_, patients) = send(&app, get_request("/api/patients")).await;
        assert_eq!(patients, json!([]));
    }

    #[tokio::test]
    async fn test_unknown_patient_is_not_found() {
        let app = test_app();
        let (status, body) = send(&app, get_request("/api/patients/P-404")).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().expect("error text").contains("P-404"));
    }

    #[tokio::test]
    async fn test_suggestions_global_and_filtered() {
        let app = test_app();
        for (id, temp) in [("P-001", "38"), ("P-002", "38"), ("P-003", "36")] {
            let (status, _) = send(
                &app,
                post_json("/api/patients", json!({"patient_id": id, "temp": temp})),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
        }

        let (status, global) = send(&app, get_request("/api/suggestions")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(global["suggestions"]["temp"], json!(["38", "36"]));
        assert_eq!(global["matchCount"], json!(3));
        assert_eq!(global["sortedFields"], json!(["temp"]));

        let (status, filtered) = send(
            &app,
            post_json(
                "/api/suggestions/filtered",
                json!({"temp": {"value": "38", "checked": true}}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(filtered["matchCount"], json!(2));
        assert_eq!(filtered["fieldFrequencies"]["temp"], json!(2));
    }

    #[tokio::test]
    async fn test_filtered_without_matches_returns_empty_shape() {
        let app = test_app();
        send(
            &app,
            post_json("/api/patients", json!({"patient_id": "P-001", "temp": "38"})),
        )
        .await;

        let (status, body) = send(
            &app,
            post_json("/api/suggestions/filtered", json!({"temp": "41"})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"suggestions": {}, "sortedFields": [], "fieldFrequencies": {}, "matchCount": 0})
        );
    }

    #[tokio::test]
    async fn test_filtered_rejects_non_object_body() {
        let app = test_app();
        let (status, _) = send(&app, post_json("/api/suggestions/filtered", json!([1, 2]))).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
