use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::GraphCoreError;
use crate::repo::RunInstance;
use crate::step::StepStatus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepOutcome {
    pub step_id: String,
    pub status: StepStatus,
    pub error: Option<GraphCoreError>,
    pub blocked_by: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Result of one scheduler run, rebuilt from its events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub run_id: Uuid,
    pub definition_hash: Option<String>,
    pub steps: Vec<StepOutcome>,
    pub cancelled: bool,
    pub run_fingerprint: Option<String>,
}

impl RunReport {
    pub fn from_instance(instance: RunInstance) -> Self {
        let steps = instance.steps
                            .into_iter()
                            .map(|s| StepOutcome { step_id: s.step_id,
                                                   status: s.status,
                                                   error: s.error,
                                                   blocked_by: s.blocked_by,
                                                   started_at: s.started_at,
                                                   finished_at: s.finished_at })
                            .collect();
        Self { run_id: instance.id,
               definition_hash: instance.definition_hash,
               steps,
               cancelled: instance.cancelled,
               run_fingerprint: instance.run_fingerprint }
    }

    /// True only if every registered step completed.
    pub fn is_success(&self) -> bool {
        !self.cancelled && self.steps.iter().all(|s| s.status == StepStatus::Completed)
    }

    pub fn outcome(&self, step_id: &str) -> Option<&StepOutcome> {
        self.steps.iter().find(|s| s.step_id == step_id)
    }

    pub fn status_of(&self, step_id: &str) -> Option<StepStatus> {
        self.outcome(step_id).map(|s| s.status)
    }

    pub fn completed_steps(&self) -> Vec<&str> {
        self.with_status(StepStatus::Completed)
    }

    pub fn failed_steps(&self) -> Vec<&str> {
        self.with_status(StepStatus::Failed)
    }

    /// Steps that never ran because a dependency failed.
    pub fn blocked_steps(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|s| s.blocked_by.is_some())
            .map(|s| s.step_id.as_str())
            .collect()
    }

    fn with_status(&self, status: StepStatus) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|s| s.status == status)
            .map(|s| s.step_id.as_str())
            .collect()
    }
}
