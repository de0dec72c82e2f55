use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::constants::{CLASS_FIELD, KEY_FIELD, TYPE_FIELD};
use crate::errors::{CoreResult, GraphCoreError};
use crate::hashing::hash_value;
use crate::identity::{direct_relationship_key, mapped_relationship_key, mapped_target_key, relationship_type};
use crate::model::entity::validate_properties;
use crate::model::{Entity, MappedRelationshipSchema, RelationshipSchema};

/// Semantic class of an edge. Serialized upper case (`HAS`, `IS`, ...); the
/// lower-case form is the verb used inside keys and types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipClass {
    Has,
    Is,
    Exploits,
    Scans,
    Identified,
    Assigned,
    Contains,
    Uses,
}

impl RelationshipClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipClass::Has => "HAS",
            RelationshipClass::Is => "IS",
            RelationshipClass::Exploits => "EXPLOITS",
            RelationshipClass::Scans => "SCANS",
            RelationshipClass::Identified => "IDENTIFIED",
            RelationshipClass::Assigned => "ASSIGNED",
            RelationshipClass::Contains => "CONTAINS",
            RelationshipClass::Uses => "USES",
        }
    }

    pub fn verb(&self) -> &'static str {
        match self {
            RelationshipClass::Has => "has",
            RelationshipClass::Is => "is",
            RelationshipClass::Exploits => "exploits",
            RelationshipClass::Scans => "scans",
            RelationshipClass::Identified => "identified",
            RelationshipClass::Assigned => "assigned",
            RelationshipClass::Contains => "contains",
            RelationshipClass::Uses => "uses",
        }
    }
}

impl fmt::Display for RelationshipClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `Forward` places the declared source as the origin of the resolved edge;
/// `Reverse` makes the resolved target the origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipDirection {
    Forward,
    Reverse,
}

/// Edge between two entities that both exist in the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectRelationship {
    #[serde(rename = "_key")]
    pub key: String,
    #[serde(rename = "_type")]
    pub relationship_type: String,
    #[serde(rename = "_class")]
    pub class: RelationshipClass,
    #[serde(rename = "_fromEntityKey")]
    pub from_entity_key: String,
    #[serde(rename = "_toEntityKey")]
    pub to_entity_key: String,
    #[serde(flatten)]
    pub properties: Map<String, Value>,
}

impl DirectRelationship {
    /// Edge typed `<fromType>_<verb>_<toType>`.
    pub fn between(from: &Entity, class: RelationshipClass, to: &Entity) -> CoreResult<Self> {
        let rel_type = relationship_type(&from.entity_type, class, &to.entity_type);
        Self::build(rel_type, class, &from.key, &to.key)
    }

    /// Edge typed after a declared schema; endpoint types must match it.
    pub fn from_schema(schema: &RelationshipSchema, from: &Entity, to: &Entity) -> CoreResult<Self> {
        if from.entity_type != schema.source_type || to.entity_type != schema.target_type {
            return Err(GraphCoreError::InvalidRelationship {
                key: direct_relationship_key(&from.key, schema.class, &to.key),
                reason: format!("{} expects {} -> {}, got {} -> {}",
                                schema.relationship_type,
                                schema.source_type,
                                schema.target_type,
                                from.entity_type,
                                to.entity_type),
            });
        }
        Self::build(schema.relationship_type.to_string(), schema.class, &from.key, &to.key)
    }

    /// Builds an edge between two keys that were resolved elsewhere.
    pub fn build(relationship_type: String, class: RelationshipClass, from_key: &str, to_key: &str)
                 -> CoreResult<Self> {
        let rel = Self { key: direct_relationship_key(from_key, class, to_key),
                         relationship_type,
                         class,
                         from_entity_key: from_key.to_string(),
                         to_entity_key: to_key.to_string(),
                         properties: Map::new() }.with_property("displayName", class.as_str());
        rel.validate()?;
        Ok(rel)
    }

    pub fn with_property(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.properties.insert(name.to_string(), value.into());
        self
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.from_entity_key.is_empty() || self.to_entity_key.is_empty() {
            return Err(GraphCoreError::InvalidRelationship { key: self.key.clone(),
                                                             reason: "endpoint key is empty".into() });
        }
        // Keys are unique per run, so equal endpoint keys mean the same entity.
        if self.from_entity_key == self.to_entity_key {
            return Err(GraphCoreError::InvalidRelationship { key: self.key.clone(),
                                                             reason: "self-loop on a single entity".into() });
        }
        validate_properties(&self.key, &self.properties)
    }

    pub fn content_hash(&self) -> String {
        hash_value(&json!({
            "_key": self.key,
            "_type": self.relationship_type,
            "_class": self.class,
            "_fromEntityKey": self.from_entity_key,
            "_toEntityKey": self.to_entity_key,
            "properties": self.properties,
        }))
    }
}

/// Target description of a deferred edge: how to find the target (any one
/// of the filter-key sets must match) and what to create when nothing does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipMapping {
    pub relationship_direction: RelationshipDirection,
    pub source_entity_key: String,
    pub source_entity_type: String,
    pub target_filter_keys: Vec<Vec<String>>,
    pub target_entity: Map<String, Value>,
    #[serde(default)]
    pub skip_target_creation: bool,
}

impl RelationshipMapping {
    /// Value of a target payload field; a single string `_class` is read as
    /// a one-element array so it compares equal to stored entities.
    pub fn target_value(&self, name: &str) -> Option<Value> {
        match (name, self.target_entity.get(name)) {
            (_, None) | (_, Some(Value::Null)) => None,
            (CLASS_FIELD, Some(Value::String(s))) => Some(json!([s])),
            (_, Some(v)) => Some(v.clone()),
        }
    }

    pub fn target_type(&self) -> Option<&str> {
        self.target_entity.get(TYPE_FIELD).and_then(Value::as_str)
    }

    /// Key of the target: the payload `_key` when given, otherwise derived
    /// from the first filter-key set (its `_type` and `_class` members
    /// excluded).
    pub fn target_key(&self) -> CoreResult<String> {
        if let Some(key) = self.target_entity.get(KEY_FIELD).and_then(Value::as_str) {
            return Ok(key.to_string());
        }
        let target_type = self.target_type().unwrap_or_default();
        let first = self.target_filter_keys.first().map(Vec::as_slice).unwrap_or_default();
        let mut values = Vec::with_capacity(first.len());
        for name in first.iter().filter(|k| ![TYPE_FIELD, CLASS_FIELD].contains(&k.as_str())) {
            values.push(self.target_value(name).unwrap_or(Value::Null));
        }
        mapped_target_key(target_type, &values)
    }

    /// Checks the filter keys against the target payload. Runs when the
    /// relationship is emitted so the error belongs to the emitting step.
    pub fn validate(&self, key: &str) -> CoreResult<()> {
        let invalid = |reason: String| GraphCoreError::InvalidMappedRelationship { key: key.to_string(),
                                                                                  reason };
        if self.source_entity_key.is_empty() {
            return Err(invalid("source entity key is empty".into()));
        }
        let target_type = self.target_type().ok_or_else(|| invalid("target entity has no _type".into()))?;
        if self.target_filter_keys.is_empty() {
            return Err(invalid("no target filter keys".into()));
        }
        for set in &self.target_filter_keys {
            if set.is_empty() {
                return Err(invalid("empty target filter key set".into()));
            }
            if let Some(missing) = set.iter().find(|k| self.target_value(k).is_none()) {
                return Err(invalid(format!("filter key {missing} is absent from the target entity")));
            }
        }
        if let Some(target_key) = self.target_entity.get(KEY_FIELD).and_then(Value::as_str) {
            if target_key == self.source_entity_key && target_type == self.source_entity_type {
                return Err(invalid("self-loop on a single entity".into()));
            }
        }
        let properties: Map<String, Value> = self.target_entity
                                                 .iter()
                                                 .filter(|(k, _)| ![KEY_FIELD, TYPE_FIELD, CLASS_FIELD].contains(&k.as_str()))
                                                 .map(|(k, v)| (k.clone(), v.clone()))
                                                 .collect();
        validate_properties(key, &properties)
    }
}

/// Deferred edge toward a target identified by filter keys. Resolved once,
/// after all steps ran, by the mapped-relationship resolver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappedRelationship {
    #[serde(rename = "_key")]
    pub key: String,
    #[serde(rename = "_type")]
    pub relationship_type: String,
    #[serde(rename = "_class")]
    pub class: RelationshipClass,
    #[serde(rename = "_mapping")]
    pub mapping: RelationshipMapping,
    #[serde(flatten)]
    pub properties: Map<String, Value>,
}

impl MappedRelationship {
    pub fn from_schema(schema: &MappedRelationshipSchema, source: &Entity, mut target_entity: Map<String, Value>,
                       filter_keys: &[&[&str]])
                       -> CoreResult<Self> {
        let provisional = format!("{}|{}|?", source.key, schema.class.verb());
        if source.entity_type != schema.source_type {
            return Err(GraphCoreError::InvalidMappedRelationship {
                key: provisional,
                reason: format!("{} expects source {}, got {}",
                                schema.relationship_type, schema.source_type, source.entity_type),
            });
        }
        match target_entity.get(TYPE_FIELD) {
            None => {
                target_entity.insert(TYPE_FIELD.to_string(), Value::String(schema.target_type.to_string()));
            }
            Some(Value::String(t)) if t == schema.target_type => {}
            Some(other) => {
                return Err(GraphCoreError::InvalidMappedRelationship {
                    key: provisional,
                    reason: format!("{} expects target {}, got {other}", schema.relationship_type, schema.target_type),
                })
            }
        }
        let mapping = RelationshipMapping { relationship_direction: schema.direction,
                                            source_entity_key: source.key.clone(),
                                            source_entity_type: source.entity_type.clone(),
                                            target_filter_keys: filter_keys.iter()
                                                                           .map(|set| {
                                                                               set.iter().map(|k| k.to_string()).collect()
                                                                           })
                                                                           .collect(),
                                            target_entity,
                                            skip_target_creation: false };
        mapping.validate(&provisional)?;
        let target_key = mapping.target_key()?;
        Ok(Self { key: mapped_relationship_key(&source.key, schema.class, &target_key),
                  relationship_type: schema.relationship_type.to_string(),
                  class: schema.class,
                  mapping,
                  properties: Map::new() }.with_property("displayName", schema.class.as_str()))
    }

    /// When set, an unmatched target is not created and the edge is dropped
    /// at resolution.
    pub fn skip_target_creation(mut self, skip: bool) -> Self {
        self.mapping.skip_target_creation = skip;
        self
    }

    pub fn with_property(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.properties.insert(name.to_string(), value.into());
        self
    }

    pub fn validate(&self) -> CoreResult<()> {
        self.mapping.validate(&self.key)?;
        validate_properties(&self.key, &self.properties)
    }

    pub fn content_hash(&self) -> String {
        hash_value(&json!({
            "_key": self.key,
            "_type": self.relationship_type,
            "_class": self.class,
            "_mapping": self.mapping,
            "properties": self.properties,
        }))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Relationship {
    Direct(DirectRelationship),
    Mapped(MappedRelationship),
}

impl Relationship {
    pub fn key(&self) -> &str {
        match self {
            Relationship::Direct(r) => &r.key,
            Relationship::Mapped(r) => &r.key,
        }
    }

    pub fn relationship_type(&self) -> &str {
        match self {
            Relationship::Direct(r) => &r.relationship_type,
            Relationship::Mapped(r) => &r.relationship_type,
        }
    }

    pub fn class(&self) -> RelationshipClass {
        match self {
            Relationship::Direct(r) => r.class,
            Relationship::Mapped(r) => r.class,
        }
    }

    pub fn validate(&self) -> CoreResult<()> {
        match self {
            Relationship::Direct(r) => r.validate(),
            Relationship::Mapped(r) => r.validate(),
        }
    }

    pub fn content_hash(&self) -> String {
        match self {
            Relationship::Direct(r) => r.content_hash(),
            Relationship::Mapped(r) => r.content_hash(),
        }
    }

    pub fn as_direct(&self) -> Option<&DirectRelationship> {
        match self {
            Relationship::Direct(r) => Some(r),
            Relationship::Mapped(_) => None,
        }
    }

    pub fn as_mapped(&self) -> Option<&MappedRelationship> {
        match self {
            Relationship::Mapped(r) => Some(r),
            Relationship::Direct(_) => None,
        }
    }
}

impl From<DirectRelationship> for Relationship {
    fn from(r: DirectRelationship) -> Self {
        Relationship::Direct(r)
    }
}

impl From<MappedRelationship> for Relationship {
    fn from(r: MappedRelationship) -> Self {
        Relationship::Mapped(r)
    }
}
