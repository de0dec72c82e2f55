//! ingest-snyk: Snyk adapter for the ingestion core.
//!
//! Provides:
//! - Type metadata for every entity and relationship the integration writes
//!   (`constants`).
//! - Typed views over raw API records, decoded at the converter boundary
//!   (`types`) and the converters that turn them into graph records
//!   (`converters`).
//! - The data-source contract the steps call (`client::SnykSource`) plus a
//!   fixture-backed implementation.
//! - The eight steps of the integration (`steps::all_steps`).

pub mod client;
pub mod config;
pub mod constants;
pub mod converters;
pub mod steps;
pub mod types;

pub use client::{FixtureSource, SnykContext, SnykSource};
pub use config::{ConfigError, IntegrationConfig};
pub use steps::all_steps;
