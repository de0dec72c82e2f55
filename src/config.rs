//! Application configuration.
//!
//! Read from environment variables (after loading `.env` once):
//!
//! | variable | meaning | default |
//! |----------|---------|---------|
//! | `SNYK_API_KEY` | API token | required |
//! | `SNYK_GROUP_ID` | Snyk group to ingest | required |
//! | `SNYK_ORG_IDS` | comma-separated organization ids to restrict to | all |
//! | `SNYK_INCLUDE_FINDINGS` | ingest findings | `true` |
//! | `INGEST_PARALLEL` | run independent steps concurrently | `false` |
//! | `INGEST_OUTPUT_DIR` | JSONL output directory | `ingest-output` |
//! | `INGEST_WRITE_RETRIES` | extra attempts after a transient write error | `3` |
//! | `INGEST_FIXTURE` | recorded API responses to replay | none |

use std::env;
use std::path::PathBuf;

use ingest_core::ExecutionMode;
use ingest_persistence::SinkConfig;
use ingest_snyk::IntegrationConfig;

use crate::errors::AppError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub integration: IntegrationConfig,
    pub sink: SinkConfig,
    pub parallel: bool,
    pub fixture: Option<PathBuf>,
}

fn parse_bool(name: &'static str, value: Option<String>, default: bool) -> Result<bool, AppError> {
    let Some(value) = value else {
        return Ok(default);
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(AppError::InvalidEnv { name, value }),
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        ingest_persistence::init_dotenv();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the config from any variable lookup and validates the
    /// integration part.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
        where F: Fn(&str) -> Option<String>
    {
        let mut integration = IntegrationConfig::new(lookup("SNYK_API_KEY").unwrap_or_default(),
                                                     lookup("SNYK_GROUP_ID").unwrap_or_default());
        integration.org_scope = lookup("SNYK_ORG_IDS").map(|ids| {
                                                          ids.split(',')
                                                             .map(str::trim)
                                                             .filter(|id| !id.is_empty())
                                                             .map(str::to_string)
                                                             .collect()
                                                      })
                                                      .unwrap_or_default();
        integration.include_findings = parse_bool("SNYK_INCLUDE_FINDINGS", lookup("SNYK_INCLUDE_FINDINGS"), true)?;
        integration.validate()?;

        Ok(Self { integration,
                  sink: SinkConfig::from_lookup(&lookup)?,
                  parallel: parse_bool("INGEST_PARALLEL", lookup("INGEST_PARALLEL"), false)?,
                  fixture: lookup("INGEST_FIXTURE").map(PathBuf::from) })
    }

    pub fn execution_mode(&self) -> ExecutionMode {
        if self.parallel {
            ExecutionMode::Parallel
        } else {
            ExecutionMode::Sequential
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use ingest_persistence::PersistenceError;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_apply() {
        let cfg = AppConfig::from_lookup(lookup(&[("SNYK_API_KEY", "t"), ("SNYK_GROUP_ID", "g-1")])).unwrap();
        assert!(cfg.integration.include_findings);
        assert!(cfg.integration.org_scope.is_empty());
        assert_eq!(cfg.execution_mode(), ExecutionMode::Sequential);
        assert_eq!(cfg.sink, SinkConfig::default());
        assert_eq!(cfg.fixture, None);
    }

    #[test]
    fn org_list_and_flags_are_parsed() {
        let cfg = AppConfig::from_lookup(lookup(&[("SNYK_API_KEY", "t"),
                                                  ("SNYK_GROUP_ID", "g-1"),
                                                  ("SNYK_ORG_IDS", "o-1, o-2,,"),
                                                  ("SNYK_INCLUDE_FINDINGS", "no"),
                                                  ("INGEST_PARALLEL", "TRUE"),
                                                  ("INGEST_OUTPUT_DIR", "/tmp/out")])).unwrap();
        assert_eq!(cfg.integration.org_scope, vec!["o-1", "o-2"]);
        assert!(!cfg.integration.include_findings);
        assert_eq!(cfg.execution_mode(), ExecutionMode::Parallel);
        assert_eq!(cfg.sink.output_dir, PathBuf::from("/tmp/out"));
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(matches!(AppConfig::from_lookup(lookup(&[("SNYK_GROUP_ID", "g-1")])),
                         Err(AppError::Config(_))));
        assert!(matches!(AppConfig::from_lookup(lookup(&[("SNYK_API_KEY", "t"),
                                                         ("SNYK_GROUP_ID", "g-1"),
                                                         ("INGEST_PARALLEL", "maybe")])),
                         Err(AppError::InvalidEnv { name: "INGEST_PARALLEL", .. })));
    }

    #[test]
    fn bad_sink_settings_are_rejected() {
        let result = AppConfig::from_lookup(lookup(&[("SNYK_API_KEY", "t"),
                                                     ("SNYK_GROUP_ID", "g-1"),
                                                     ("INGEST_WRITE_RETRIES", "lots")]));
        assert!(matches!(result,
                         Err(AppError::Persistence(PersistenceError::InvalidSetting { name: "INGEST_WRITE_RETRIES",
                                                                                       .. }))));
        let cfg = AppConfig::from_lookup(lookup(&[("SNYK_API_KEY", "t"),
                                                  ("SNYK_GROUP_ID", "g-1"),
                                                  ("INGEST_WRITE_RETRIES", "7")])).unwrap();
        assert_eq!(cfg.sink.write_retries, 7);
    }
}
