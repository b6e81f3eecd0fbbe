//! # Medform Core
//!
//! Core business logic for the Medform clinical form system.
//!
//! This crate contains pure data operations over patient documents:
//! - Master schema maintenance (`schema`)
//! - Field-presence and value frequency statistics (`frequency`)
//! - Context filtering and ranking with suggestion backfill (`filter`, `ranking`)
//! - The annotated form tree and its save-time flattening (`tree`, `flatten`)
//! - Storage behind the `PatientRepository` trait under `PATIENT_DATA_DIR`
//!
//! **No API concerns**: HTTP servers and CLI parsing belong in `api-rest` and `cli`;
//! wire types shared between them live in `api-shared`.

pub mod config;
pub mod constants;
pub mod document;
pub mod error;
pub mod filter;
pub mod flatten;
pub mod frequency;
pub mod migration;
pub mod node;
pub mod ordering;
pub mod patient;
pub mod ranking;
pub mod repositories;
pub mod schema;
pub mod tree;

pub use config::{CoreConfig, RankingConfig};
pub use document::Document;
pub use error::{PatientError, PatientResult};
pub use medform_types::{PatientId, TextError};
pub use node::{Fields, Node};
pub use ordering::FieldOrder;
pub use patient::{PatientService, Reordered};
pub use ranking::RankingOutput;
pub use repositories::{InMemoryRepository, JsonFileRepository, PatientRepository};
