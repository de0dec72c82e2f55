//! Events a run emits to its `EventStore`.
//!
//! The scheduler never keeps step state outside the event log: the run
//! report is rebuilt by replaying these events (`repo::RunRepository`).
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::GraphCoreError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RunEventKind {
    /// First event of every run. Fixes the step graph hash.
    RunInitialized { definition_hash: String, step_count: usize },
    StepStarted { step_id: String, level: usize },
    StepCompleted { step_id: String },
    StepFailed { step_id: String, error: GraphCoreError },
    /// The step was not run because a (transitive) dependency failed or was
    /// itself blocked.
    StepBlocked { step_id: String, failed_dependency: String },
    /// The run was aborted; `pending` lists the steps that never started.
    RunCancelled { pending: Vec<String> },
    /// Closing event. `run_fingerprint` hashes the sorted entity and
    /// relationship keys of the job state.
    RunCompleted { run_fingerprint: String, succeeded: bool },
}

impl RunEventKind {
    /// Short tag used in logs and tests.
    pub fn tag(&self) -> &'static str {
        match self {
            RunEventKind::RunInitialized { .. } => "I",
            RunEventKind::StepStarted { .. } => "S",
            RunEventKind::StepCompleted { .. } => "C",
            RunEventKind::StepFailed { .. } => "F",
            RunEventKind::StepBlocked { .. } => "B",
            RunEventKind::RunCancelled { .. } => "X",
            RunEventKind::RunCompleted { .. } => "R",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunEvent {
    pub seq: u64,
    pub run_id: Uuid,
    pub kind: RunEventKind,
    pub ts: DateTime<Utc>,
}
