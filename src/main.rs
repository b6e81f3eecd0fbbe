use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::AppState;
use medform_core::{CoreConfig, PatientService};

/// Main entry point for the Medform application
///
/// Loads `.env` if present, resolves the core configuration once and serves
/// the REST API (with Swagger UI at `/swagger-ui`).
///
/// # Environment Variables
/// - `MEDFORM_REST_ADDR`: REST server address (default: "0.0.0.0:3001")
/// - `PATIENT_DATA_DIR`: Directory holding `db.json` (default: "patient_data")
/// - `MEDFORM_SUGGESTION_COUNT`: Suggestions per field (default: 4)
/// - `MEDFORM_VISIBILITY_THRESHOLD`: Fill percentage for nested fields to show (default: 15)
///
/// # Returns
/// * `Ok(())` - If the server starts and runs successfully
/// * `Err(anyhow::Error)` - If configuration, startup or the server fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("medform=info".parse()?)
                .add_directive("medform_core=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr = std::env::var("MEDFORM_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3001".into());

    let cfg = Arc::new(CoreConfig::from_env_values(
        std::env::var("PATIENT_DATA_DIR").ok(),
        std::env::var("MEDFORM_SUGGESTION_COUNT").ok(),
        std::env::var("MEDFORM_VISIBILITY_THRESHOLD").ok(),
    )?);

    tracing::info!("++ Patient database at {}", cfg.database_path().display());
    tracing::info!("++ Starting Medform REST on {}", rest_addr);

    let patient_service = PatientService::open(cfg)?;
    api_rest::serve(&rest_addr, AppState::new(patient_service)).await
}
