//! Builder for `Scheduler`.
//!
//! Collects step descriptors and optional stores; `build` validates the step
//! graph, so a cyclic or dangling `depends_on` never reaches `run`.

use crate::engine::{ExecutionMode, Scheduler};
use crate::errors::CoreResult;
use crate::event::{EventStore, InMemoryEventStore};
use crate::repo::{InMemoryRunRepository, RunRepository};
use crate::step::{CancellationFlag, StepDescriptor};

pub struct SchedulerBuilder<C, E = InMemoryEventStore, R = InMemoryRunRepository> {
    steps: Vec<StepDescriptor<C>>,
    event_store: E,
    repository: R,
    mode: ExecutionMode,
    cancellation: Option<CancellationFlag>,
}

impl<C> SchedulerBuilder<C> {
    pub fn new() -> Self {
        Self { steps: Vec::new(),
               event_store: InMemoryEventStore::new(),
               repository: InMemoryRunRepository::new(),
               mode: ExecutionMode::default(),
               cancellation: None }
    }
}

impl<C> Default for SchedulerBuilder<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C, E, R> SchedulerBuilder<C, E, R>
    where C: Sync,
          E: EventStore,
          R: RunRepository
{
    pub fn add_step(mut self, step: StepDescriptor<C>) -> Self {
        self.steps.push(step);
        self
    }

    pub fn add_steps(mut self, steps: impl IntoIterator<Item = StepDescriptor<C>>) -> Self {
        self.steps.extend(steps);
        self
    }

    pub fn mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn cancellation(mut self, flag: CancellationFlag) -> Self {
        self.cancellation = Some(flag);
        self
    }

    /// Swaps the event store (e.g. for a persistent one).
    pub fn event_store<E2: EventStore>(self, event_store: E2) -> SchedulerBuilder<C, E2, R> {
        SchedulerBuilder { steps: self.steps,
                           event_store,
                           repository: self.repository,
                           mode: self.mode,
                           cancellation: self.cancellation }
    }

    pub fn repository<R2: RunRepository>(self, repository: R2) -> SchedulerBuilder<C, E, R2> {
        SchedulerBuilder { steps: self.steps,
                           event_store: self.event_store,
                           repository,
                           mode: self.mode,
                           cancellation: self.cancellation }
    }

    pub fn build(self) -> CoreResult<Scheduler<C, E, R>> {
        let scheduler = Scheduler::new(self.steps, self.event_store, self.repository)?.with_mode(self.mode);
        Ok(match self.cancellation {
            Some(flag) => scheduler.with_cancellation(flag),
            None => scheduler,
        })
    }
}
