use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required config field: {0}")]
    Missing(&'static str),
    #[error("invalid config field {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Instance configuration shared by every step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationConfig {
    pub api_key: String,
    pub group_id: String,
    /// Organization ids to restrict ingestion to; empty means all.
    #[serde(default)]
    pub org_scope: Vec<String>,
    #[serde(default = "default_true")]
    pub include_findings: bool,
}

fn default_true() -> bool {
    true
}

impl IntegrationConfig {
    pub fn new(api_key: impl Into<String>, group_id: impl Into<String>) -> Self {
        Self { api_key: api_key.into(),
               group_id: group_id.into(),
               org_scope: Vec::new(),
               include_findings: true }
    }

    /// Rejects a config the steps cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::Missing("apiKey"));
        }
        if self.group_id.trim().is_empty() {
            return Err(ConfigError::Missing("groupId"));
        }
        if self.group_id.contains(&['|', ':'][..]) {
            return Err(ConfigError::Invalid { field: "groupId",
                                              reason: format!("{:?} contains a key separator", self.group_id) });
        }
        if let Some(blank) = self.org_scope.iter().find(|o| o.trim().is_empty()) {
            return Err(ConfigError::Invalid { field: "orgScope",
                                              reason: format!("blank organization id {blank:?}") });
        }
        Ok(())
    }

    pub fn in_scope(&self, org_id: &str) -> bool {
        self.org_scope.is_empty() || self.org_scope.iter().any(|o| o == org_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation() {
        assert_eq!(IntegrationConfig::new("", "g").validate(), Err(ConfigError::Missing("apiKey")));
        assert_eq!(IntegrationConfig::new("k", " ").validate(), Err(ConfigError::Missing("groupId")));
        assert!(IntegrationConfig::new("k", "a:b").validate().is_err());
        assert!(IntegrationConfig::new("k", "g").validate().is_ok());
    }

    #[test]
    fn empty_scope_includes_everything() {
        let mut config = IntegrationConfig::new("k", "g");
        assert!(config.in_scope("org-1"));
        config.org_scope = vec!["org-2".into()];
        assert!(!config.in_scope("org-1"));
        assert!(config.in_scope("org-2"));
    }
}
