//! ingest-persistence
//!
//! File-backed implementations of the core's output contracts:
//! - `jsonl::JsonlGraphSink`: writes a closed `GraphSnapshot` as JSON Lines
//!   (`entities.jsonl`, `relationships.jsonl`, `mapped_relationships.jsonl`)
//!   under one directory per run.
//! - `jsonl::JsonlEventStore`: append-only run event log, one event per line.
//! - `config`: output settings from the environment (`.env` aware).
//!
//! Writes retry on transient IO errors with a short linear backoff.

pub mod config;
pub mod error;
pub mod jsonl;

pub use config::{init_dotenv, SinkConfig};
pub use error::PersistenceError;
pub use jsonl::{JsonlEventStore, JsonlGraphSink};
