use std::collections::HashSet;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use indexmap::IndexMap;
use log::debug;
use serde_json::Value;
use uuid::Uuid;

use crate::constants::SCHEDULER_VERSION;
use crate::errors::{CoreResult, GraphCoreError};
use crate::hashing::hash_str;
use crate::model::{DirectRelationship, Entity, MappedRelationship, Relationship};
use crate::resolve::Resolution;
use crate::sink::GraphSnapshot;

/// Value stored in a named slot.
#[derive(Debug, Clone, PartialEq)]
pub enum SlotValue {
    Entity(Arc<Entity>),
    Json(Value),
}

/// Entities and relationships accumulated by the steps of one run.
///
/// Key maps are sharded (`DashMap`) so steps scheduled in parallel can write
/// concurrently; all writes for one key are serialized by the shard lock, so
/// duplicate detection is exact. The type index is ordered by insertion and
/// is only locked after the entity shard (never the other way round).
pub struct JobState {
    run_id: Uuid,
    entities: DashMap<String, Arc<Entity>>,
    type_index: RwLock<IndexMap<String, Vec<String>>>,
    relationships: DashMap<String, Arc<Relationship>>,
    slots: DashMap<String, SlotValue>,
}

impl JobState {
    pub fn new(run_id: Uuid) -> Self {
        Self { run_id,
               entities: DashMap::new(),
               type_index: RwLock::new(IndexMap::new()),
               relationships: DashMap::new(),
               slots: DashMap::new() }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    fn index_read(&self) -> CoreResult<RwLockReadGuard<'_, IndexMap<String, Vec<String>>>> {
        self.type_index
            .read()
            .map_err(|_| GraphCoreError::Internal("type index lock poisoned".into()))
    }

    fn index_write(&self) -> CoreResult<RwLockWriteGuard<'_, IndexMap<String, Vec<String>>>> {
        self.type_index
            .write()
            .map_err(|_| GraphCoreError::Internal("type index lock poisoned".into()))
    }

    /// Inserts an entity. Re-adding an identical payload (same key, type,
    /// class and properties) returns the stored entity; any other collision
    /// fails with `DuplicateEntity`.
    pub fn add_entity(&self, entity: Entity) -> CoreResult<Arc<Entity>> {
        self.insert_entity(entity, false)
    }

    /// Like `add_entity`, but a collision with an entity of the same `_type`
    /// is a no-op returning the stored entity even if properties differ.
    pub fn add_entity_idempotent(&self, entity: Entity) -> CoreResult<Arc<Entity>> {
        self.insert_entity(entity, true)
    }

    fn insert_entity(&self, entity: Entity, same_type_is_noop: bool) -> CoreResult<Arc<Entity>> {
        entity.validate()?;
        match self.entities.entry(entity.key.clone()) {
            Entry::Occupied(existing) => {
                let stored = existing.get();
                let same = if same_type_is_noop {
                    stored.entity_type == entity.entity_type
                } else {
                    stored.content_hash() == entity.content_hash()
                };
                if same {
                    debug!("add_entity:noop key={}", entity.key);
                    Ok(stored.clone())
                } else {
                    Err(GraphCoreError::DuplicateEntity { key: entity.key })
                }
            }
            Entry::Vacant(slot) => {
                let mut index = self.index_write()?;
                index.entry(entity.entity_type.clone()).or_default().push(entity.key.clone());
                let stored = Arc::new(entity);
                slot.insert(stored.clone());
                Ok(stored)
            }
        }
    }

    /// Inserts a relationship. A byte-identical re-add is a no-op; a
    /// different relationship under the same key fails with
    /// `DuplicateRelationship`.
    pub fn add_relationship(&self, relationship: impl Into<Relationship>) -> CoreResult<Arc<Relationship>> {
        let relationship = relationship.into();
        relationship.validate()?;
        match self.relationships.entry(relationship.key().to_string()) {
            Entry::Occupied(existing) => {
                if existing.get().content_hash() == relationship.content_hash() {
                    debug!("add_relationship:noop key={}", relationship.key());
                    Ok(existing.get().clone())
                } else {
                    Err(GraphCoreError::DuplicateRelationship { key: relationship.key().to_string() })
                }
            }
            Entry::Vacant(slot) => {
                let stored = Arc::new(relationship);
                slot.insert(stored.clone());
                Ok(stored)
            }
        }
    }

    /// Membership test over entity and relationship keys.
    pub fn has_key(&self, key: &str) -> bool {
        self.entities.contains_key(key) || self.relationships.contains_key(key)
    }

    /// Entities of one type in insertion order. Each call takes its own
    /// snapshot of the index; entities added afterwards are not yielded.
    pub fn iterate_entities(&self, entity_type: &str) -> CoreResult<EntityIter<'_>> {
        let keys = self.index_read()?.get(entity_type).cloned().unwrap_or_default();
        Ok(EntityIter { state: self,
                        keys: keys.into_iter() })
    }

    pub fn find_entity(&self, key: &str) -> Option<Arc<Entity>> {
        self.entities.get(key).map(|e| e.value().clone())
    }

    /// Source record the stored entity with this key was built from.
    pub fn get_raw_data(&self, entity: &Entity) -> Option<Arc<Value>> {
        self.entities.get(&entity.key).and_then(|e| e.raw_data().cloned())
    }

    pub fn set_data(&self, name: &str, value: SlotValue) {
        self.slots.insert(name.to_string(), value);
    }

    pub fn get_data(&self, name: &str) -> Option<SlotValue> {
        self.slots.get(name).map(|v| v.value().clone())
    }

    pub fn set_entity_slot(&self, name: &str, entity: Arc<Entity>) {
        self.set_data(name, SlotValue::Entity(entity));
    }

    /// Entity stored under `name`; absent or non-entity slots are reported
    /// as missing dependency data.
    pub fn entity_slot(&self, name: &str) -> CoreResult<Arc<Entity>> {
        match self.get_data(name) {
            Some(SlotValue::Entity(e)) => Ok(e),
            Some(SlotValue::Json(_)) => {
                Err(GraphCoreError::MissingDependencyData(format!("slot {name} does not hold an entity")))
            }
            None => Err(GraphCoreError::MissingDependencyData(format!("slot {name} is empty"))),
        }
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn entity_count_by_type(&self, entity_type: &str) -> usize {
        self.index_read()
            .map(|index| index.get(entity_type).map_or(0, Vec::len))
            .unwrap_or(0)
    }

    pub fn relationship_count(&self) -> usize {
        self.relationships.len()
    }

    /// Entity types in first-seen order.
    pub fn entity_types(&self) -> Vec<String> {
        self.index_read().map(|index| index.keys().cloned().collect()).unwrap_or_default()
    }

    pub fn entity_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entities.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    pub fn relationship_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.relationships.iter().map(|r| r.key().clone()).collect();
        keys.sort();
        keys
    }

    /// Stored entities sorted by key.
    pub fn entities(&self) -> Vec<Arc<Entity>> {
        let mut all: Vec<Arc<Entity>> = self.entities.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| a.key.cmp(&b.key));
        all
    }

    /// Direct relationships sorted by key.
    pub fn direct_relationships(&self) -> Vec<DirectRelationship> {
        let mut all: Vec<DirectRelationship> =
            self.relationships.iter().filter_map(|r| r.value().as_direct().cloned()).collect();
        all.sort_by(|a, b| a.key.cmp(&b.key));
        all
    }

    /// Deferred relationships sorted by key.
    pub fn mapped_relationships(&self) -> Vec<MappedRelationship> {
        let mut all: Vec<MappedRelationship> =
            self.relationships.iter().filter_map(|r| r.value().as_mapped().cloned()).collect();
        all.sort_by(|a, b| a.key.cmp(&b.key));
        all
    }

    /// blake3 over the scheduler version, the sorted entity keys and the
    /// sorted relationship keys. Independent of insertion order.
    pub fn key_fingerprint(&self) -> String {
        let mut buf = format!("{SCHEDULER_VERSION}\n");
        for key in self.entity_keys() {
            buf.push_str(&key);
            buf.push('\n');
        }
        buf.push('\n');
        for key in self.relationship_keys() {
            buf.push_str(&key);
            buf.push('\n');
        }
        hash_str(&buf)
    }

    /// Produces the closed, duplicate-free collection handed to a sink.
    /// Every direct edge (including resolved mapped edges) must point at an
    /// entity of this run or one created by the resolver.
    pub fn close(&self, resolution: Resolution) -> CoreResult<GraphSnapshot> {
        let entities: Vec<Entity> = self.entities().iter().map(|e| e.as_ref().clone()).collect();
        let mut known: HashSet<&str> = entities.iter().map(|e| e.key.as_str()).collect();
        known.extend(resolution.created_entities.iter().map(|e| e.key.as_str()));

        let relationships = self.direct_relationships();
        let edges = relationships.iter()
                                 .chain(resolution.relationships.iter().map(|r| &r.relationship));
        for edge in edges {
            for endpoint in [&edge.from_entity_key, &edge.to_entity_key] {
                if !known.contains(endpoint.as_str()) {
                    return Err(GraphCoreError::DanglingRelationship { key: edge.key.clone(),
                                                                      missing: endpoint.clone() });
                }
            }
        }
        debug!("close:ok run_id={} entities={} relationships={} mapped={}",
               self.run_id,
               entities.len(),
               relationships.len(),
               resolution.relationships.len());
        Ok(GraphSnapshot { run_id: self.run_id,
                           entities,
                           relationships,
                           mapped_relationships: resolution.relationships,
                           mapped_targets: resolution.created_entities,
                           skipped_mapped_relationships: resolution.skipped })
    }
}

/// Lazy iterator over a snapshot of one type's keys.
pub struct EntityIter<'a> {
    state: &'a JobState,
    keys: std::vec::IntoIter<String>,
}

impl Iterator for EntityIter<'_> {
    type Item = Arc<Entity>;

    fn next(&mut self) -> Option<Self::Item> {
        for key in self.keys.by_ref() {
            if let Some(e) = self.state.find_entity(&key) {
                return Some(e);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RelationshipClass;
    use serde_json::json;

    fn org(id: &str) -> Entity {
        Entity::new(format!("snyk_org:{id}"), "snyk_organization", &["Organization"]).with_property("id", id)
    }

    #[test]
    fn identical_readd_is_noop() {
        let state = JobState::new(Uuid::new_v4());
        state.add_entity(org("1")).unwrap();
        state.add_entity(org("1")).unwrap();
        assert_eq!(state.entity_count(), 1);
        assert_eq!(state.entity_count_by_type("snyk_organization"), 1);
    }

    #[test]
    fn conflicting_readd_fails() {
        let state = JobState::new(Uuid::new_v4());
        state.add_entity(org("1")).unwrap();
        let err = state.add_entity(org("1").with_property("name", "other")).unwrap_err();
        assert_eq!(err, GraphCoreError::DuplicateEntity { key: "snyk_org:1".into() });
    }

    #[test]
    fn idempotent_readd_keeps_first_payload() {
        let state = JobState::new(Uuid::new_v4());
        state.add_entity(org("1")).unwrap();
        let kept = state.add_entity_idempotent(org("1").with_property("name", "other")).unwrap();
        assert_eq!(kept.property("name"), None);
        let other_type = Entity::new("snyk_org:1", "snyk_user", &[]);
        assert!(state.add_entity_idempotent(other_type).is_err());
    }

    #[test]
    fn iteration_is_insertion_ordered_and_restartable() {
        let state = JobState::new(Uuid::new_v4());
        for id in ["3", "1", "2"] {
            state.add_entity(org(id)).unwrap();
        }
        let first: Vec<String> = state.iterate_entities("snyk_organization").unwrap().map(|e| e.key.clone()).collect();
        assert_eq!(first, vec!["snyk_org:3", "snyk_org:1", "snyk_org:2"]);
        let mut a = state.iterate_entities("snyk_organization").unwrap();
        let mut b = state.iterate_entities("snyk_organization").unwrap();
        assert_eq!(a.next().unwrap().key, "snyk_org:3");
        assert_eq!(b.next().unwrap().key, "snyk_org:3");
        assert_eq!(state.iterate_entities("nope").unwrap().count(), 0);
    }

    #[test]
    fn raw_data_round_trips() {
        let state = JobState::new(Uuid::new_v4());
        let raw = json!({"id": "1", "nested": {"internalId": 42}});
        let stored = state.add_entity(org("1").with_raw_data(raw.clone())).unwrap();
        assert_eq!(state.get_raw_data(&stored).as_deref(), Some(&raw));
        assert_eq!(state.get_raw_data(&org("1")).as_deref(), Some(&raw));
        assert!(state.get_raw_data(&org("2")).is_none());
    }

    #[test]
    fn relationship_dedup() {
        let state = JobState::new(Uuid::new_v4());
        let a = state.add_entity(org("1")).unwrap();
        let b = state.add_entity(Entity::new("snyk_user:1", "snyk_user", &["User"])).unwrap();
        let rel = DirectRelationship::between(&a, RelationshipClass::Has, &b).unwrap();
        state.add_relationship(rel.clone()).unwrap();
        state.add_relationship(rel.clone()).unwrap();
        assert_eq!(state.relationship_count(), 1);
        assert!(state.has_key(&rel.key));
        assert!(state.has_key("snyk_org:1"));
        assert!(!state.has_key("snyk_org:2"));

        let conflicting = rel.with_property("since", 2020);
        assert!(matches!(state.add_relationship(conflicting),
                         Err(GraphCoreError::DuplicateRelationship { .. })));
    }

    #[test]
    fn slots() {
        let state = JobState::new(Uuid::new_v4());
        assert!(matches!(state.entity_slot("GROUP_ENTITY"), Err(GraphCoreError::MissingDependencyData(_))));
        let group = state.add_entity(Entity::new("snyk_group:g", "snyk_group", &["Group"])).unwrap();
        state.set_entity_slot("GROUP_ENTITY", group.clone());
        assert_eq!(state.entity_slot("GROUP_ENTITY").unwrap(), group);
        state.set_data("CURSOR", SlotValue::Json(json!(3)));
        assert_eq!(state.get_data("CURSOR"), Some(SlotValue::Json(json!(3))));
        assert!(state.entity_slot("CURSOR").is_err());
    }

    #[test]
    fn fingerprint_ignores_insertion_order() {
        let a = JobState::new(Uuid::new_v4());
        let b = JobState::new(Uuid::new_v4());
        a.add_entity(org("1")).unwrap();
        a.add_entity(org("2")).unwrap();
        b.add_entity(org("2")).unwrap();
        b.add_entity(org("1")).unwrap();
        assert_eq!(a.key_fingerprint(), b.key_fingerprint());
    }

    #[test]
    fn close_rejects_dangling_edges() {
        let state = JobState::new(Uuid::new_v4());
        let a = state.add_entity(org("1")).unwrap();
        let ghost = Entity::new("snyk_user:ghost", "snyk_user", &[]);
        state.add_relationship(DirectRelationship::between(&a, RelationshipClass::Has, &ghost).unwrap())
             .unwrap();
        let err = state.close(Resolution::default()).unwrap_err();
        assert!(matches!(err, GraphCoreError::DanglingRelationship { missing, .. } if missing == "snyk_user:ghost"));
    }
}
