//! Data-source contract used by the steps, and a fixture-backed source.
//!
//! The HTTP client itself lives outside this crate; the steps only rely on
//! the iteration contract: one raw record per callback, exhaustive, finite,
//! and failures reported as `Err` rather than a partial result.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use ingest_core::{CoreResult, GraphCoreError};
use log::debug;
use serde::Deserialize;
use serde_json::Value;

use crate::config::IntegrationConfig;

/// Callback receiving one raw record. Returning `Err` stops the iteration
/// and is propagated by the source.
pub type RecordCallback<'a> = &'a mut dyn FnMut(Value) -> CoreResult<()>;

pub trait SnykSource: Send + Sync {
    fn get_group_details(&self) -> CoreResult<Value>;
    fn iterate_organizations(&self, callback: RecordCallback<'_>) -> CoreResult<()>;
    fn iterate_projects(&self, org_id: &str, callback: RecordCallback<'_>) -> CoreResult<()>;
    fn iterate_users(&self, org_id: &str, callback: RecordCallback<'_>) -> CoreResult<()>;
    fn iterate_roles(&self, callback: RecordCallback<'_>) -> CoreResult<()>;
    fn iterate_issues(&self, project_id: &str, callback: RecordCallback<'_>) -> CoreResult<()>;
}

/// What every step receives as its client: the source plus the instance
/// config.
#[derive(Clone)]
pub struct SnykContext {
    pub source: Arc<dyn SnykSource>,
    pub config: IntegrationConfig,
}

impl SnykContext {
    pub fn new(source: Arc<dyn SnykSource>, config: IntegrationConfig) -> Self {
        Self { source, config }
    }
}

/// Recorded API responses. `failures` names resources whose iteration
/// fails, e.g. `"roles"`, `"issues:<projectId>"`, `"users:<orgId>"`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fixture {
    pub group: Value,
    #[serde(default)]
    pub organizations: Vec<Value>,
    /// Keyed by organization id.
    #[serde(default)]
    pub projects: HashMap<String, Vec<Value>>,
    /// Keyed by organization id.
    #[serde(default)]
    pub users: HashMap<String, Vec<Value>>,
    #[serde(default)]
    pub roles: Vec<Value>,
    /// Keyed by project id.
    #[serde(default)]
    pub issues: HashMap<String, Vec<Value>>,
    #[serde(default)]
    pub failures: Vec<String>,
}

/// `SnykSource` replaying a `Fixture`.
#[derive(Debug, Clone, Default)]
pub struct FixtureSource {
    fixture: Fixture,
    failures: HashSet<String>,
}

impl FixtureSource {
    pub fn new(fixture: Fixture) -> Self {
        let failures = fixture.failures.iter().cloned().collect();
        Self { fixture, failures }
    }

    pub fn from_json_str(json: &str) -> CoreResult<Self> {
        let fixture: Fixture = serde_json::from_str(json).map_err(|e| {
                                                              GraphCoreError::ExternalSource(format!("invalid fixture: {e}"))
                                                          })?;
        Ok(Self::new(fixture))
    }

    pub fn from_path(path: impl AsRef<Path>) -> CoreResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
                                                    GraphCoreError::ExternalSource(format!("cannot read fixture {}: {e}",
                                                                                           path.display()))
                                                })?;
        Self::from_json_str(&json)
    }

    /// Makes iteration of `resource` fail.
    pub fn failing(mut self, resource: &str) -> Self {
        self.failures.insert(resource.to_string());
        self
    }

    fn check(&self, resource: &str) -> CoreResult<()> {
        if self.failures.contains(resource) {
            return Err(GraphCoreError::ExternalSource(format!("{resource}: request failed")));
        }
        Ok(())
    }

    fn replay(&self, resource: &str, records: Option<&Vec<Value>>, callback: RecordCallback<'_>) -> CoreResult<()> {
        self.check(resource)?;
        let records = records.map(Vec::as_slice).unwrap_or_default();
        debug!("fixture:iterate resource={resource} records={}", records.len());
        for record in records {
            callback(record.clone())?;
        }
        Ok(())
    }
}

impl SnykSource for FixtureSource {
    fn get_group_details(&self) -> CoreResult<Value> {
        self.check("group")?;
        Ok(self.fixture.group.clone())
    }

    fn iterate_organizations(&self, callback: RecordCallback<'_>) -> CoreResult<()> {
        self.replay("organizations", Some(&self.fixture.organizations), callback)
    }

    fn iterate_projects(&self, org_id: &str, callback: RecordCallback<'_>) -> CoreResult<()> {
        self.replay(&format!("projects:{org_id}"), self.fixture.projects.get(org_id), callback)
    }

    fn iterate_users(&self, org_id: &str, callback: RecordCallback<'_>) -> CoreResult<()> {
        self.replay(&format!("users:{org_id}"), self.fixture.users.get(org_id), callback)
    }

    fn iterate_roles(&self, callback: RecordCallback<'_>) -> CoreResult<()> {
        self.replay("roles", Some(&self.fixture.roles), callback)
    }

    fn iterate_issues(&self, project_id: &str, callback: RecordCallback<'_>) -> CoreResult<()> {
        self.replay(&format!("issues:{project_id}"), self.fixture.issues.get(project_id), callback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn replays_records_and_injected_failures() {
        let source = FixtureSource::from_json_str(r#"{
            "group": {"id": "g1", "name": "Acme"},
            "roles": [{"name": "Admin"}, {"name": "Collaborator"}],
            "failures": ["users:o1"]
        }"#).unwrap();
        let mut seen = Vec::new();
        source.iterate_roles(&mut |r| {
                  seen.push(r);
                  Ok(())
              })
              .unwrap();
        assert_eq!(seen, vec![json!({"name": "Admin"}), json!({"name": "Collaborator"})]);
        assert!(source.iterate_users("o1", &mut |_| Ok(())).is_err());
        assert!(source.iterate_users("o2", &mut |_| Ok(())).is_ok());
        assert!(source.failing("group").get_group_details().is_err());
    }

    #[test]
    fn callback_error_stops_iteration() {
        let source = FixtureSource::new(Fixture { organizations: vec![json!({"id": "1"}), json!({"id": "2"})],
                                                  ..Fixture::default() });
        let mut calls = 0;
        let result = source.iterate_organizations(&mut |_| {
                               calls += 1;
                               Err(GraphCoreError::Cancelled)
                           });
        assert_eq!(result, Err(GraphCoreError::Cancelled));
        assert_eq!(calls, 1);
    }
}
