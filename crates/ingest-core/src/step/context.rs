use std::sync::Arc;

use serde_json::Value;

use crate::errors::{CoreResult, GraphCoreError};
use crate::model::{Entity, Relationship};
use crate::state::{EntityIter, JobState, SlotValue};
use crate::step::{CancellationFlag, StepDescriptor};

/// Everything a step may touch while it runs: the job state (writes limited
/// to the types the step declared), the source client and the run's
/// cancellation flag.
pub struct StepExecutionContext<'a, C> {
    step: &'a StepDescriptor<C>,
    job_state: &'a JobState,
    client: &'a C,
    cancellation: &'a CancellationFlag,
}

impl<'a, C> StepExecutionContext<'a, C> {
    pub fn new(step: &'a StepDescriptor<C>, job_state: &'a JobState, client: &'a C,
               cancellation: &'a CancellationFlag)
               -> Self {
        Self { step,
               job_state,
               client,
               cancellation }
    }

    pub fn step_id(&self) -> &str {
        &self.step.id
    }

    pub fn client(&self) -> &'a C {
        self.client
    }

    pub fn job_state(&self) -> &'a JobState {
        self.job_state
    }

    /// Fails with `Cancelled` once the run was aborted. Steps call it at
    /// source-iteration boundaries.
    pub fn checkpoint(&self) -> CoreResult<()> {
        if self.cancellation.is_cancelled() {
            return Err(GraphCoreError::Cancelled);
        }
        Ok(())
    }

    fn undeclared(&self, type_name: &str) -> GraphCoreError {
        GraphCoreError::UndeclaredType { step_id: self.step.id.clone(),
                                         type_name: type_name.to_string() }
    }

    pub fn add_entity(&self, entity: Entity) -> CoreResult<Arc<Entity>> {
        if !self.step.declares_entity_type(&entity.entity_type) {
            return Err(self.undeclared(&entity.entity_type));
        }
        self.job_state.add_entity(entity)
    }

    pub fn add_entity_idempotent(&self, entity: Entity) -> CoreResult<Arc<Entity>> {
        if !self.step.declares_entity_type(&entity.entity_type) {
            return Err(self.undeclared(&entity.entity_type));
        }
        self.job_state.add_entity_idempotent(entity)
    }

    pub fn add_relationship(&self, relationship: impl Into<Relationship>) -> CoreResult<Arc<Relationship>> {
        let relationship = relationship.into();
        let declared = match &relationship {
            Relationship::Direct(r) => self.step.declares_relationship_type(&r.relationship_type),
            Relationship::Mapped(r) => self.step.declares_mapped_relationship_type(&r.relationship_type),
        };
        if !declared {
            return Err(self.undeclared(relationship.relationship_type()));
        }
        self.job_state.add_relationship(relationship)
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.job_state.has_key(key)
    }

    pub fn iterate_entities(&self, entity_type: &str) -> CoreResult<EntityIter<'a>> {
        self.job_state.iterate_entities(entity_type)
    }

    pub fn find_entity(&self, key: &str) -> Option<Arc<Entity>> {
        self.job_state.find_entity(key)
    }

    pub fn get_raw_data(&self, entity: &Entity) -> Option<Arc<Value>> {
        self.job_state.get_raw_data(entity)
    }

    pub fn set_data(&self, name: &str, value: SlotValue) {
        self.job_state.set_data(name, value)
    }

    pub fn get_data(&self, name: &str) -> Option<SlotValue> {
        self.job_state.get_data(name)
    }

    pub fn set_entity_slot(&self, name: &str, entity: Arc<Entity>) {
        self.job_state.set_entity_slot(name, entity)
    }

    pub fn entity_slot(&self, name: &str) -> CoreResult<Arc<Entity>> {
        self.job_state.entity_slot(name)
    }
}
