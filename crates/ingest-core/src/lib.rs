//! ingest-core: vendor-agnostic ingestion engine.
//!
//! Steps write entities and relationships into a per-run `JobState`; the
//! `Scheduler` runs them in dependency order; the
//! `MappedRelationshipResolver` turns deferred edges into concrete ones; the
//! closed `GraphSnapshot` goes to a `GraphSink`.
pub mod constants;
pub mod engine;
pub mod errors;
pub mod event;
pub mod hashing;
pub mod identity;
pub mod model;
pub mod repo;
pub mod resolve;
pub mod sink;
pub mod state;
pub mod step;

pub use engine::{ExecutionMode, RunReport, Scheduler, SchedulerBuilder, StepGraph, StepOutcome};
pub use errors::{classify_error, CoreResult, ErrorClass, GraphCoreError};
pub use event::{EventStore, InMemoryEventStore, RunEvent, RunEventKind};
pub use model::{DirectRelationship, Entity, EntitySchema, MappedRelationship, MappedRelationshipSchema, Relationship,
                RelationshipClass, RelationshipDirection, RelationshipMapping, RelationshipSchema};
pub use repo::{InMemoryRunRepository, RunInstance, RunRepository};
pub use resolve::{MappedRelationshipResolver, Resolution, ResolvedMappedRelationship};
pub use sink::{GraphSink, GraphSnapshot, InMemoryGraphSink};
pub use state::{JobState, SlotValue};
pub use step::{CancellationFlag, StepDescriptor, StepExecutionContext, StepExecutor, StepStatus};
