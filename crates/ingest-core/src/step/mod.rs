//! Step descriptors and what a step sees while it runs.
//!
//! A step is pure data: id, human name, the entity/relationship types it may
//! write, the ids it depends on and a plain function pointer. The function
//! receives the job state and the source client through
//! `StepExecutionContext`; nothing is captured.

mod cancel;
mod context;
pub mod definition;
mod status;

pub use cancel::CancellationFlag;
pub use context::StepExecutionContext;
pub use definition::{StepDescriptor, StepExecutor};
pub use status::StepStatus;
