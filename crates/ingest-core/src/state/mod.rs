//! Per-run accumulator of entities and relationships.

mod job_state;

pub use job_state::{EntityIter, JobState, SlotValue};
