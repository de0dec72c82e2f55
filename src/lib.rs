//! snyk-ingest
//!
//! Application layer over the workspace crates:
//! - `config`: environment-driven `AppConfig`.
//! - `errors`: `AppError`, wrapping the crate-level errors.
//! - `pipeline`: `run_ingestion`, one run from scheduling to publishing.

pub mod config;
pub mod errors;
pub mod pipeline;

pub use config::AppConfig;
pub use errors::AppError;
pub use pipeline::{run_ingestion, IngestionOutcome};
