//! Closed graph handed to persistence, and the sink contract.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::CoreResult;
use crate::model::{DirectRelationship, Entity};
use crate::resolve::ResolvedMappedRelationship;

/// Duplicate-free result of a run. Entities and relationships are sorted by
/// key; mapped relationships keep resolution order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphSnapshot {
    pub run_id: Uuid,
    pub entities: Vec<Entity>,
    pub relationships: Vec<DirectRelationship>,
    pub mapped_relationships: Vec<ResolvedMappedRelationship>,
    /// Entities created by the resolver for unmatched mapped targets.
    pub mapped_targets: Vec<Entity>,
    #[serde(default)]
    pub skipped_mapped_relationships: Vec<String>,
}

impl GraphSnapshot {
    /// Looks up an entity among the run's entities and resolver-created
    /// targets.
    pub fn find_entity(&self, key: &str) -> Option<&Entity> {
        self.entities.iter().chain(self.mapped_targets.iter()).find(|e| e.key == key)
    }

    pub fn entities_of_type<'a>(&'a self, entity_type: &'a str) -> impl Iterator<Item = &'a Entity> + 'a {
        self.entities
            .iter()
            .chain(self.mapped_targets.iter())
            .filter(move |e| e.entity_type == entity_type)
    }

    /// All concrete edges: direct ones plus resolved mapped ones.
    pub fn all_relationships(&self) -> impl Iterator<Item = &DirectRelationship> {
        self.relationships
            .iter()
            .chain(self.mapped_relationships.iter().map(|m| &m.relationship))
    }

    pub fn relationships_to<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a DirectRelationship> + 'a {
        self.all_relationships().filter(move |r| r.to_entity_key == key)
    }
}

/// Receives the closed graph of a run.
pub trait GraphSink {
    fn publish(&mut self, snapshot: &GraphSnapshot) -> CoreResult<()>;
}

/// Keeps published snapshots in memory.
#[derive(Debug, Default)]
pub struct InMemoryGraphSink {
    pub published: Vec<GraphSnapshot>,
}

impl InMemoryGraphSink {
    pub fn last(&self) -> Option<&GraphSnapshot> {
        self.published.last()
    }
}

impl GraphSink for InMemoryGraphSink {
    fn publish(&mut self, snapshot: &GraphSnapshot) -> CoreResult<()> {
        self.published.push(snapshot.clone());
        Ok(())
    }
}
