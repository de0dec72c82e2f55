//! One ingestion run end to end: schedule the steps against a fresh job
//! state, resolve mapped relationships, close the graph and publish it.

use ingest_core::{EventStore, ExecutionMode, GraphSink, GraphSnapshot, JobState, MappedRelationshipResolver,
                  RunReport, SchedulerBuilder};
use ingest_snyk::{all_steps, SnykContext};
use log::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;

#[derive(Debug)]
pub struct IngestionOutcome {
    pub report: RunReport,
    pub snapshot: GraphSnapshot,
}

/// Runs every step, then publishes whatever the run produced. A failed
/// step does not prevent publishing the writes of the steps that ran; the
/// report tells the caller which parts are missing.
pub fn run_ingestion<E, S>(context: &SnykContext, mode: ExecutionMode, event_store: E, sink: &mut S)
                           -> Result<IngestionOutcome, AppError>
    where E: EventStore,
          S: GraphSink
{
    context.config.validate()?;
    let state = JobState::new(Uuid::new_v4());
    let mut scheduler = SchedulerBuilder::new().add_steps(all_steps())
                                               .mode(mode)
                                               .event_store(event_store)
                                               .build()?;
    let report = scheduler.run(&state, context)?;
    if !report.is_success() {
        warn!("run:partial run_id={} failed={:?} blocked={:?}",
              state.run_id(),
              report.failed_steps(),
              report.blocked_steps());
    }

    let resolution = MappedRelationshipResolver::new().resolve(&state)?;
    let snapshot = state.close(resolution)?;
    sink.publish(&snapshot)?;
    info!("run:published run_id={} entities={} relationships={} mapped_targets={}",
          snapshot.run_id,
          snapshot.entities.len(),
          snapshot.relationships.len() + snapshot.mapped_relationships.len(),
          snapshot.mapped_targets.len());
    Ok(IngestionOutcome { report, snapshot })
}
