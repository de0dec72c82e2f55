//! Dependency-ordered execution of steps over one job state.

use log::{error, info, warn};
use rayon::prelude::*;

use crate::engine::{RunReport, StepGraph};
use crate::errors::{classify_error, CoreResult, GraphCoreError};
use crate::event::{EventStore, InMemoryEventStore, RunEvent, RunEventKind};
use crate::repo::{InMemoryRunRepository, RunRepository};
use crate::state::JobState;
use crate::step::{CancellationFlag, StepDescriptor, StepExecutionContext, StepStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// One step at a time, levels in order, declaration order within a
    /// level.
    #[default]
    Sequential,
    /// All runnable steps of a level at once on the rayon pool.
    Parallel,
}

/// Runs steps level by level. A failed step blocks everything that depends
/// on it (transitively); unrelated branches still run. Every state change
/// is an event, and the returned report is a replay of those events.
pub struct Scheduler<C, E = InMemoryEventStore, R = InMemoryRunRepository>
    where E: EventStore,
          R: RunRepository
{
    steps: Vec<StepDescriptor<C>>,
    graph: StepGraph,
    mode: ExecutionMode,
    event_store: E,
    repository: R,
    cancellation: CancellationFlag,
}

impl<C, E, R> Scheduler<C, E, R>
    where C: Sync,
          E: EventStore,
          R: RunRepository
{
    pub fn new(steps: Vec<StepDescriptor<C>>, event_store: E, repository: R) -> CoreResult<Self> {
        let graph = StepGraph::new(&steps)?;
        Ok(Self { steps,
                  graph,
                  mode: ExecutionMode::default(),
                  event_store,
                  repository,
                  cancellation: CancellationFlag::new() })
    }

    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_cancellation(mut self, cancellation: CancellationFlag) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn graph(&self) -> &StepGraph {
        &self.graph
    }

    pub fn steps(&self) -> &[StepDescriptor<C>] {
        &self.steps
    }

    /// Handle that aborts the run from another thread.
    pub fn cancellation(&self) -> CancellationFlag {
        self.cancellation.clone()
    }

    pub fn event_store(&self) -> &E {
        &self.event_store
    }

    pub fn events(&self, run_id: uuid::Uuid) -> CoreResult<Vec<RunEvent>> {
        self.event_store.list(run_id)
    }

    /// Executes every step against `state`, using `client` as the data
    /// source. Step failures are reported, not returned; only event store
    /// failures make this return `Err`.
    pub fn run(&mut self, state: &JobState, client: &C) -> CoreResult<RunReport> {
        let run_id = state.run_id();
        let n = self.graph.len();
        self.event_store.append_kind(run_id,
                                     RunEventKind::RunInitialized { definition_hash: self.graph
                                                                                         .definition_hash()
                                                                                         .to_string(),
                                                                    step_count: n })?;
        info!("run:start run_id={run_id} steps={n} mode={:?}", self.mode);

        let mut status = vec![StepStatus::Pending; n];
        let mut cancelled = false;
        let levels = self.graph.levels().to_vec();

        'levels: for (level_no, level) in levels.iter().enumerate() {
            let mut runnable = Vec::with_capacity(level.len());
            for &i in level {
                let not_done = self.graph
                                   .dependencies(i)
                                   .iter()
                                   .find(|&&d| status[d] != StepStatus::Completed);
                match not_done {
                    Some(&d) => {
                        warn!("step:blocked step_id={} failed_dependency={}", self.graph.id(i), self.graph.id(d));
                        self.event_store.append_kind(run_id,
                                                     RunEventKind::StepBlocked { step_id: self.graph.id(i).to_string(),
                                                                                 failed_dependency:
                                                                                     self.graph.id(d).to_string() })?;
                    }
                    None => runnable.push(i),
                }
            }

            match self.mode {
                ExecutionMode::Sequential => {
                    for &i in &runnable {
                        if self.cancellation.is_cancelled() {
                            cancelled = true;
                            break 'levels;
                        }
                        self.start(run_id, i, level_no, &mut status)?;
                        let outcome = execute(&self.steps[i], state, client, &self.cancellation);
                        cancelled |= self.finish(run_id, i, outcome, &mut status)?;
                        if cancelled {
                            break 'levels;
                        }
                    }
                }
                ExecutionMode::Parallel => {
                    if self.cancellation.is_cancelled() {
                        cancelled = true;
                        break 'levels;
                    }
                    for &i in &runnable {
                        self.start(run_id, i, level_no, &mut status)?;
                    }
                    let steps = &self.steps;
                    let flag = &self.cancellation;
                    let outcomes: Vec<(usize, CoreResult<()>)> =
                        runnable.par_iter().map(|&i| (i, execute(&steps[i], state, client, flag))).collect();
                    for (i, outcome) in outcomes {
                        cancelled |= self.finish(run_id, i, outcome, &mut status)?;
                    }
                    if cancelled {
                        break 'levels;
                    }
                }
            }
        }

        if cancelled {
            let pending: Vec<String> = (0..n).filter(|&i| status[i] == StepStatus::Pending)
                                             .map(|i| self.graph.id(i).to_string())
                                             .collect();
            warn!("run:cancelled run_id={run_id} pending={}", pending.len());
            self.event_store.append_kind(run_id, RunEventKind::RunCancelled { pending })?;
        }

        let succeeded = !cancelled && status.iter().all(|s| *s == StepStatus::Completed);
        let run_fingerprint = state.key_fingerprint();
        self.event_store.append_kind(run_id,
                                     RunEventKind::RunCompleted { run_fingerprint: run_fingerprint.clone(),
                                                                  succeeded })?;
        info!("run:done run_id={run_id} succeeded={succeeded} entities={} relationships={} fingerprint={run_fingerprint}",
              state.entity_count(),
              state.relationship_count());

        let events = self.event_store.list(run_id)?;
        let instance = self.repository.load(run_id, &events, self.graph.ids());
        Ok(RunReport::from_instance(instance))
    }

    fn start(&mut self, run_id: uuid::Uuid, i: usize, level: usize, status: &mut [StepStatus]) -> CoreResult<()> {
        status[i] = StepStatus::Running;
        info!("step:start step_id={} level={level}", self.graph.id(i));
        self.event_store.append_kind(run_id,
                                     RunEventKind::StepStarted { step_id: self.graph.id(i).to_string(),
                                                                 level })?;
        Ok(())
    }

    /// Records a step outcome. Returns true when the step observed
    /// cancellation.
    fn finish(&mut self, run_id: uuid::Uuid, i: usize, outcome: CoreResult<()>, status: &mut [StepStatus])
              -> CoreResult<bool> {
        let step_id = self.graph.id(i).to_string();
        match outcome {
            Ok(()) => {
                status[i] = StepStatus::Completed;
                info!("step:completed step_id={step_id}");
                self.event_store.append_kind(run_id, RunEventKind::StepCompleted { step_id })?;
                Ok(false)
            }
            Err(err) => {
                status[i] = StepStatus::Failed;
                let was_cancelled = err == GraphCoreError::Cancelled;
                error!("step:failed step_id={step_id} class={:?} error={err}", classify_error(&err));
                self.event_store.append_kind(run_id, RunEventKind::StepFailed { step_id, error: err })?;
                Ok(was_cancelled)
            }
        }
    }
}

fn execute<C>(step: &StepDescriptor<C>, state: &JobState, client: &C, cancellation: &CancellationFlag)
              -> CoreResult<()> {
    let ctx = StepExecutionContext::new(step, state, client, cancellation);
    (step.executor)(&ctx)
}
