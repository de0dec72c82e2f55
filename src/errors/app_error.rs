use ingest_core::GraphCoreError;
use ingest_persistence::PersistenceError;
use ingest_snyk::ConfigError;
use thiserror::Error;

/// Errors surfaced by the ingestion binary.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("invalid value for {name}: {value:?}")]
    InvalidEnv { name: &'static str, value: String },
    #[error("ingestion error: {0}")]
    Core(#[from] GraphCoreError),
    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_crate_errors() {
        let err: AppError = ConfigError::Missing("apiKey").into();
        assert_eq!(err.to_string(), "configuration error: missing required config field: apiKey");
        let err: AppError = GraphCoreError::Cancelled.into();
        assert!(err.to_string().starts_with("ingestion error:"));
    }
}
