//! Run state rebuilt from events.
//!
//! Replay is linear: events are applied in `seq` order to a fresh
//! `RunInstance`. Nothing else is consulted, so a persisted event log
//! reproduces the same instance.
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::errors::GraphCoreError;
use crate::event::{RunEvent, RunEventKind};
use crate::step::StepStatus;

#[derive(Debug, Clone, PartialEq)]
pub struct RunInstance {
    pub id: Uuid,
    pub definition_hash: Option<String>,
    pub steps: Vec<StepSlot>,
    pub cancelled: bool,
    pub completed: bool,
    pub run_fingerprint: Option<String>,
}

impl RunInstance {
    pub fn slot(&self, step_id: &str) -> Option<&StepSlot> {
        self.steps.iter().find(|s| s.step_id == step_id)
    }
}

/// State of one step in the instance.
#[derive(Debug, Clone, PartialEq)]
pub struct StepSlot {
    pub step_id: String,
    pub status: StepStatus,
    /// Topological level the step was scheduled in.
    pub level: Option<usize>,
    pub error: Option<GraphCoreError>,
    /// Dependency whose failure kept this step from running.
    pub blocked_by: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub attempts: u32,
}

impl StepSlot {
    fn pending(step_id: &str) -> Self {
        Self { step_id: step_id.to_string(),
               status: StepStatus::Pending,
               level: None,
               error: None,
               blocked_by: None,
               started_at: None,
               finished_at: None,
               attempts: 0 }
    }
}

/// Rebuilds a run from its events.
pub trait RunRepository {
    fn load(&self, run_id: Uuid, events: &[RunEvent], step_ids: &[String]) -> RunInstance;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct InMemoryRunRepository;

impl InMemoryRunRepository {
    pub fn new() -> Self {
        Self
    }
}

impl RunRepository for InMemoryRunRepository {
    fn load(&self, run_id: Uuid, events: &[RunEvent], step_ids: &[String]) -> RunInstance {
        let mut instance = RunInstance { id: run_id,
                                         definition_hash: None,
                                         steps: step_ids.iter().map(|id| StepSlot::pending(id)).collect(),
                                         cancelled: false,
                                         completed: false,
                                         run_fingerprint: None };
        for ev in events {
            match &ev.kind {
                RunEventKind::RunInitialized { definition_hash, .. } => {
                    instance.definition_hash = Some(definition_hash.clone());
                }
                RunEventKind::StepStarted { step_id, level } => {
                    if let Some(slot) = slot_mut(&mut instance.steps, step_id) {
                        slot.status = StepStatus::Running;
                        slot.level = Some(*level);
                        slot.started_at = Some(ev.ts);
                        slot.attempts += 1;
                    }
                }
                RunEventKind::StepCompleted { step_id } => {
                    if let Some(slot) = slot_mut(&mut instance.steps, step_id) {
                        slot.status = StepStatus::Completed;
                        slot.finished_at = Some(ev.ts);
                    }
                }
                RunEventKind::StepFailed { step_id, error } => {
                    if let Some(slot) = slot_mut(&mut instance.steps, step_id) {
                        slot.status = StepStatus::Failed;
                        slot.error = Some(error.clone());
                        slot.finished_at = Some(ev.ts);
                    }
                }
                RunEventKind::StepBlocked { step_id, failed_dependency } => {
                    if let Some(slot) = slot_mut(&mut instance.steps, step_id) {
                        slot.blocked_by = Some(failed_dependency.clone());
                    }
                }
                RunEventKind::RunCancelled { .. } => instance.cancelled = true,
                RunEventKind::RunCompleted { run_fingerprint, .. } => {
                    instance.completed = true;
                    instance.run_fingerprint = Some(run_fingerprint.clone());
                }
            }
        }
        instance
    }
}

fn slot_mut<'a>(steps: &'a mut [StepSlot], step_id: &str) -> Option<&'a mut StepSlot> {
    steps.iter_mut().find(|s| s.step_id == step_id)
}
