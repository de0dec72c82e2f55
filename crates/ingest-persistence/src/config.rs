//! Output settings from environment variables (`INGEST_OUTPUT_DIR`,
//! `INGEST_WRITE_RETRIES`).

use std::path::PathBuf;

use dotenvy::dotenv;
use once_cell::sync::Lazy;

use crate::error::PersistenceError;

// .env is loaded at most once per process; a missing file is fine.
static DOTENV_LOADED: Lazy<()> = Lazy::new(|| {
    let _ = dotenv();
});

pub const DEFAULT_OUTPUT_DIR: &str = "ingest-output";
pub const DEFAULT_WRITE_RETRIES: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkConfig {
    pub output_dir: PathBuf,
    /// Extra attempts after a transient IO failure.
    pub write_retries: u32,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self { output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
               write_retries: DEFAULT_WRITE_RETRIES }
    }
}

impl SinkConfig {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self { output_dir: output_dir.into(),
               ..Self::default() }
    }

    /// Reads the output settings through `lookup`. Unset variables keep
    /// their defaults; a retry count that does not parse is an error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, PersistenceError>
        where F: Fn(&str) -> Option<String>
    {
        let mut config = Self::default();
        if let Some(dir) = lookup("INGEST_OUTPUT_DIR") {
            config.output_dir = PathBuf::from(dir);
        }
        if let Some(retries) = lookup("INGEST_WRITE_RETRIES") {
            config.write_retries =
                retries.trim().parse().map_err(|_| PersistenceError::InvalidSetting { name: "INGEST_WRITE_RETRIES",
                                                                                      value: retries.clone() })?;
        }
        Ok(config)
    }

    pub fn event_log_path(&self) -> PathBuf {
        self.output_dir.join("events.jsonl")
    }
}

/// Forces the `.env` load early, for binaries that read other variables.
pub fn init_dotenv() {
    Lazy::force(&DOTENV_LOADED);
}
