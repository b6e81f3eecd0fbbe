//! Standalone REST API server binary.
//!
//! ## Purpose
//! Runs the REST API server on its own.
//!
//! ## Intended use
//! This binary is useful for development and debugging. The workspace's main
//! `medform-run` binary serves the same router after loading `.env`.

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::AppState;
use medform_core::{CoreConfig, PatientService};

/// Main entry point for the Medform REST API server
///
/// # Environment Variables
/// - `MEDFORM_REST_ADDR`: Server address (default: "0.0.0.0:3001")
/// - `PATIENT_DATA_DIR`: Directory holding `db.json` (default: "patient_data")
/// - `MEDFORM_SUGGESTION_COUNT`: Suggestions per field (default: 4)
/// - `MEDFORM_VISIBILITY_THRESHOLD`: Fill percentage for nested fields to show (default: 15)
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - the configuration is invalid or the database cannot be opened,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("api_rest=info".parse()?)
                .add_directive("medform_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = std::env::var("MEDFORM_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3001".into());

    tracing::info!("-- Starting Medform REST API on {}", addr);

    let cfg = Arc::new(CoreConfig::from_env_values(
        std::env::var("PATIENT_DATA_DIR").ok(),
        std::env::var("MEDFORM_SUGGESTION_COUNT").ok(),
        std::env::var("MEDFORM_VISIBILITY_THRESHOLD").ok(),
    )?);
    tracing::info!(
        "-- Patient database at {}",
        cfg.database_path().display()
    );

    let patient_service = PatientService::open(cfg)?;
    api_rest::serve(&addr, AppState::new(patient_service)).await
}
