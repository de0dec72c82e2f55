//! Persistence errors. IO failures are split into transient ones (worth a
//! retry) and the rest.

use std::io;

use ingest_core::GraphCoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("transient IO error (retryable): {0}")]
    TransientIo(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("corrupt record at {path}:{line}: {reason}")]
    Corrupt { path: String, line: usize, reason: String },
    #[error("invalid value for {name}: {value:?}")]
    InvalidSetting { name: &'static str, value: String },
}

impl From<io::Error> for PersistenceError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => {
                Self::TransientIo(err.to_string())
            }
            _ => Self::Io(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<PersistenceError> for GraphCoreError {
    fn from(err: PersistenceError) -> Self {
        GraphCoreError::Internal(format!("persistence: {err}"))
    }
}
