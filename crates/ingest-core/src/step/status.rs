use serde::{Deserialize, Serialize};

/// Runtime state of a step.
///
/// Valid transitions:
/// - `Pending` -> `Running`
/// - `Running` -> `Completed`
/// - `Running` -> `Failed`
///
/// A step whose dependency failed never leaves `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl StepStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StepStatus::Completed | StepStatus::Failed)
    }
}
