//! # API Shared
//!
//! Shared request/response definitions for the Medform APIs.
//!
//! Contains:
//! - Wire types (`types` module) with OpenAPI schemas
//! - Shared services like `HealthService`
//!
//! Used by `medform-core`, `api-rest` and the CLI for common functionality.

pub mod health;
pub mod types;

pub use health::HealthService;
pub use types::*;
