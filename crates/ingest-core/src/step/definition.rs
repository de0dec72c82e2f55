use std::fmt;

use crate::errors::CoreResult;
use crate::model::{EntitySchema, MappedRelationshipSchema, RelationshipSchema};
use crate::step::StepExecutionContext;

/// Execution function of a step. `C` is the source client type.
pub type StepExecutor<C> = for<'a> fn(&StepExecutionContext<'a, C>) -> CoreResult<()>;

/// Immutable step metadata plus its execution function.
pub struct StepDescriptor<C> {
    pub id: String,
    pub name: String,
    pub entities: Vec<EntitySchema>,
    pub relationships: Vec<RelationshipSchema>,
    pub mapped_relationships: Vec<MappedRelationshipSchema>,
    pub depends_on: Vec<String>,
    pub executor: StepExecutor<C>,
}

impl<C> StepDescriptor<C> {
    pub fn new(id: &str, name: &str, executor: StepExecutor<C>) -> Self {
        Self { id: id.to_string(),
               name: name.to_string(),
               entities: Vec::new(),
               relationships: Vec::new(),
               mapped_relationships: Vec::new(),
               depends_on: Vec::new(),
               executor }
    }

    pub fn with_entities(mut self, entities: &[EntitySchema]) -> Self {
        self.entities.extend_from_slice(entities);
        self
    }

    pub fn with_relationships(mut self, relationships: &[RelationshipSchema]) -> Self {
        self.relationships.extend_from_slice(relationships);
        self
    }

    pub fn with_mapped_relationships(mut self, mapped: &[MappedRelationshipSchema]) -> Self {
        self.mapped_relationships.extend_from_slice(mapped);
        self
    }

    pub fn with_dependencies(mut self, step_ids: &[&str]) -> Self {
        self.depends_on.extend(step_ids.iter().map(|s| s.to_string()));
        self
    }

    pub fn declares_entity_type(&self, entity_type: &str) -> bool {
        self.entities.iter().any(|e| e.entity_type == entity_type)
    }

    pub fn declares_relationship_type(&self, relationship_type: &str) -> bool {
        self.relationships.iter().any(|r| r.relationship_type == relationship_type)
    }

    pub fn declares_mapped_relationship_type(&self, relationship_type: &str) -> bool {
        self.mapped_relationships.iter().any(|r| r.relationship_type == relationship_type)
    }
}

// Manual impls: a derive would require `C: Clone` / `C: Debug`.
impl<C> Clone for StepDescriptor<C> {
    fn clone(&self) -> Self {
        Self { id: self.id.clone(),
               name: self.name.clone(),
               entities: self.entities.clone(),
               relationships: self.relationships.clone(),
               mapped_relationships: self.mapped_relationships.clone(),
               depends_on: self.depends_on.clone(),
               executor: self.executor }
    }
}

impl<C> fmt::Debug for StepDescriptor<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepDescriptor")
         .field("id", &self.id)
         .field("name", &self.name)
         .field("entities", &self.entities.iter().map(|e| e.entity_type).collect::<Vec<_>>())
         .field("relationships",
                &self.relationships.iter().map(|r| r.relationship_type).collect::<Vec<_>>())
         .field("mapped_relationships",
                &self.mapped_relationships.iter().map(|r| r.relationship_type).collect::<Vec<_>>())
         .field("depends_on", &self.depends_on)
         .finish()
    }
}
