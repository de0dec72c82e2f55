//! Replay of run events into per-step state.

mod types;

pub use types::{InMemoryRunRepository, RunInstance, RunRepository, StepSlot};
