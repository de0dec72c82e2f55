use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::constants::{CLASS_FIELD, KEY_FIELD, TYPE_FIELD};
use crate::errors::{CoreResult, GraphCoreError};
use crate::hashing::to_canonical_json;
use crate::model::{DirectRelationship, Entity, MappedRelationship, RelationshipDirection};
use crate::state::JobState;

/// A deferred edge rewritten against a concrete target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedMappedRelationship {
    pub mapped_key: String,
    pub target_key: String,
    pub target_created: bool,
    pub relationship: DirectRelationship,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    /// Targets that matched nothing and were built from their payload.
    pub created_entities: Vec<Entity>,
    pub relationships: Vec<ResolvedMappedRelationship>,
    /// Keys of mapped relationships dropped because no target matched and
    /// target creation was disabled.
    pub skipped: Vec<String>,
}

impl Resolution {
    pub fn created_count(&self) -> usize {
        self.created_entities.len()
    }
}

/// filter-key set -> (canonical JSON of its values -> target key)
type FilterIndex = HashMap<Vec<String>, HashMap<String, String>>;

/// Resolves every mapped relationship of a run, in key order.
///
/// A target is matched when all fields of any one filter-key set equal the
/// payload's values; the first set that matches wins. Candidates are the
/// run's entities plus any `known` entities (e.g. from a previous sync),
/// and the smallest key wins among several matches. Targets created during
/// resolution become candidates for the relationships resolved after them,
/// so a CVE referenced twice yields one entity.
#[derive(Debug, Default)]
pub struct MappedRelationshipResolver {
    known: Vec<Arc<Entity>>,
}

impl MappedRelationshipResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entities that exist outside this run and may be matched as targets.
    pub fn with_known_entities(mut self, entities: impl IntoIterator<Item = Entity>) -> Self {
        self.known.extend(entities.into_iter().map(Arc::new));
        self
    }

    pub fn resolve(&self, state: &JobState) -> CoreResult<Resolution> {
        let mut candidates: BTreeMap<String, Arc<Entity>> =
            self.known.iter().map(|e| (e.key.clone(), e.clone())).collect();
        for e in state.entities() {
            candidates.insert(e.key.clone(), e);
        }
        let mut index: FilterIndex = HashMap::new();
        let mut resolution = Resolution::default();
        let mut edge_keys: HashSet<String> = HashSet::new();

        for mapped in state.mapped_relationships() {
            let source_key = &mapped.mapping.source_entity_key;
            if state.find_entity(source_key).is_none() {
                return Err(GraphCoreError::DanglingRelationship { key: mapped.key.clone(),
                                                                  missing: source_key.clone() });
            }

            let (target_key, created) = match match_target(&mapped, &candidates, &mut index) {
                Some(key) => (key, false),
                None if mapped.mapping.skip_target_creation => {
                    debug!("resolve:skip key={} reason=no_match", mapped.key);
                    resolution.skipped.push(mapped.key.clone());
                    continue;
                }
                None => {
                    let target = target_entity(&mapped)?;
                    if candidates.contains_key(&target.key) {
                        return Err(GraphCoreError::DuplicateEntity { key: target.key });
                    }
                    let target = Arc::new(target);
                    add_to_index(&target, &mut index);
                    candidates.insert(target.key.clone(), target.clone());
                    resolution.created_entities.push(target.as_ref().clone());
                    (target.key.clone(), true)
                }
            };

            let (from, to) = match mapped.mapping.relationship_direction {
                RelationshipDirection::Forward => (source_key.as_str(), target_key.as_str()),
                RelationshipDirection::Reverse => (target_key.as_str(), source_key.as_str()),
            };
            let mut edge = DirectRelationship::build(mapped.relationship_type.clone(), mapped.class, from, to)?;
            edge.properties.extend(mapped.properties.clone());

            let clashes_with_run = edge.key != mapped.key && state.has_key(&edge.key);
            if clashes_with_run || !edge_keys.insert(edge.key.clone()) {
                return Err(GraphCoreError::DuplicateRelationship { key: edge.key });
            }
            resolution.relationships.push(ResolvedMappedRelationship { mapped_key: mapped.key.clone(),
                                                                       target_key,
                                                                       target_created: created,
                                                                       relationship: edge });
        }

        info!("resolve:done relationships={} created={} skipped={}",
              resolution.relationships.len(),
              resolution.created_count(),
              resolution.skipped.len());
        Ok(resolution)
    }
}

fn match_target(mapped: &MappedRelationship, candidates: &BTreeMap<String, Arc<Entity>>, index: &mut FilterIndex)
                -> Option<String> {
    for set in &mapped.mapping.target_filter_keys {
        let values: Option<Vec<Value>> = set.iter().map(|k| mapped.mapping.target_value(k)).collect();
        let probe = to_canonical_json(&Value::Array(values?));
        let by_values = index.entry(set.clone()).or_insert_with(|| build_index(set, candidates));
        if let Some(key) = by_values.get(&probe) {
            return Some(key.clone());
        }
    }
    None
}

fn filter_values(entity: &Entity, set: &[String]) -> Option<String> {
    let values: Option<Vec<Value>> = set.iter().map(|k| entity.property(k)).collect();
    values.map(|v| to_canonical_json(&Value::Array(v)))
}

fn build_index(set: &[String], candidates: &BTreeMap<String, Arc<Entity>>) -> HashMap<String, String> {
    let mut by_values = HashMap::new();
    // BTreeMap order: the first insert per value set is the smallest key.
    for (key, entity) in candidates {
        if let Some(probe) = filter_values(entity, set) {
            by_values.entry(probe).or_insert_with(|| key.clone());
        }
    }
    by_values
}

fn add_to_index(entity: &Entity, index: &mut FilterIndex) {
    for (set, by_values) in index.iter_mut() {
        if let Some(probe) = filter_values(entity, set) {
            by_values.entry(probe).or_insert_with(|| entity.key.clone());
        }
    }
}

/// Builds the entity described by a mapped relationship's target payload.
fn target_entity(mapped: &MappedRelationship) -> CoreResult<Entity> {
    let key = mapped.mapping.target_key()?;
    let entity_type = mapped.mapping.target_type().unwrap_or_default().to_string();
    let class: Vec<String> = match mapped.mapping.target_entity.get(CLASS_FIELD) {
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).map(str::to_string).collect(),
        _ => Vec::new(),
    };
    let properties: Map<String, Value> =
        mapped.mapping
              .target_entity
              .iter()
              .filter(|(k, _)| ![KEY_FIELD, TYPE_FIELD, CLASS_FIELD].contains(&k.as_str()))
              .map(|(k, v)| (k.clone(), v.clone()))
              .collect();
    let mut entity = Entity::new(key, entity_type, &[]);
    entity.class = class;
    entity.properties = properties;
    entity.validate()?;
    Ok(entity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MappedRelationshipSchema, RelationshipClass};
    use serde_json::json;
    use uuid::Uuid;

    const PROJECT_SCANS_REPO: MappedRelationshipSchema =
        MappedRelationshipSchema { relationship_type: "snyk_project_scans_coderepo",
                                   source_type: "snyk_project",
                                   class: RelationshipClass::Scans,
                                   target_type: "CodeRepo",
                                   direction: RelationshipDirection::Forward };

    fn repo_payload(full_name: &str) -> Map<String, Value> {
        let mut m = Map::new();
        m.insert("_class".into(), json!("CodeRepo"));
        m.insert("fullName".into(), json!(full_name));
        m
    }

    fn project(state: &JobState, id: &str) -> Arc<Entity> {
        state.add_entity(Entity::new(format!("snyk_project:o1-{id}"), "snyk_project", &["Project"])).unwrap()
    }

    #[test]
    fn matches_known_entity_instead_of_creating() {
        let state = JobState::new(Uuid::new_v4());
        let p = project(&state, "p1");
        let rel = MappedRelationship::from_schema(&PROJECT_SCANS_REPO, &p, repo_payload("acme/api"),
                                                  &[&["_type", "fullName"]]).unwrap();
        state.add_relationship(rel).unwrap();

        let existing = Entity::new("github_repo:123", "CodeRepo", &["CodeRepo"]).with_property("fullName", "acme/api");
        let resolution = MappedRelationshipResolver::new().with_known_entities([existing])
                                                          .resolve(&state)
                                                          .unwrap();
        assert!(resolution.created_entities.is_empty());
        assert_eq!(resolution.relationships[0].target_key, "github_repo:123");
        assert_eq!(resolution.relationships[0].relationship.key, "snyk_project:o1-p1|scans|github_repo:123");
    }

    #[test]
    fn reverse_direction_swaps_endpoints() {
        let schema = MappedRelationshipSchema { direction: RelationshipDirection::Reverse, ..PROJECT_SCANS_REPO };
        let state = JobState::new(Uuid::new_v4());
        let p = project(&state, "p1");
        let rel = MappedRelationship::from_schema(&schema, &p, repo_payload("acme/api"), &[&["_type", "fullName"]])
                  .unwrap();
        state.add_relationship(rel).unwrap();
        let resolution = MappedRelationshipResolver::new().resolve(&state).unwrap();
        let edge = &resolution.relationships[0].relationship;
        assert_eq!(edge.from_entity_key, "CodeRepo:acme/api");
        assert_eq!(edge.to_entity_key, "snyk_project:o1-p1");
        assert!(resolution.relationships[0].target_created);
    }

    #[test]
    fn skip_target_creation_drops_unmatched_edge() {
        let state = JobState::new(Uuid::new_v4());
        let p = project(&state, "p1");
        let rel = MappedRelationship::from_schema(&PROJECT_SCANS_REPO, &p, repo_payload("acme/api"),
                                                  &[&["_type", "fullName"]]).unwrap()
                                                                            .skip_target_creation(true);
        let key = rel.key.clone();
        state.add_relationship(rel).unwrap();
        let resolution = MappedRelationshipResolver::new().resolve(&state).unwrap();
        assert!(resolution.relationships.is_empty());
        assert_eq!(resolution.skipped, vec![key]);
    }

    #[test]
    fn created_target_class_is_normalized() {
        let state = JobState::new(Uuid::new_v4());
        let p = project(&state, "p1");
        state.add_relationship(MappedRelationship::from_schema(&PROJECT_SCANS_REPO, &p, repo_payload("acme/api"),
                                                               &[&["_class", "fullName"]]).unwrap())
             .unwrap();
        let resolution = MappedRelationshipResolver::new().resolve(&state).unwrap();
        assert_eq!(resolution.created_entities[0].class, vec!["CodeRepo".to_string()]);
        assert_eq!(resolution.created_entities[0].entity_type, "CodeRepo");
    }

    #[test]
    fn missing_source_is_dangling() {
        let state = JobState::new(Uuid::new_v4());
        let p = Entity::new("snyk_project:o1-p9", "snyk_project", &["Project"]);
        state.add_relationship(MappedRelationship::from_schema(&PROJECT_SCANS_REPO, &p, repo_payload("acme/api"),
                                                               &[&["_type", "fullName"]]).unwrap())
             .unwrap();
        let err = MappedRelationshipResolver::new().resolve(&state).unwrap_err();
        assert!(matches!(err, GraphCoreError::DanglingRelationship { .. }));
    }
}
