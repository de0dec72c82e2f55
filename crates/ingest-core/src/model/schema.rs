//! Static type metadata a step declares for what it may write.

use crate::model::{RelationshipClass, RelationshipDirection};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntitySchema {
    pub resource_name: &'static str,
    pub entity_type: &'static str,
    pub class: &'static [&'static str],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelationshipSchema {
    pub relationship_type: &'static str,
    pub source_type: &'static str,
    pub class: RelationshipClass,
    pub target_type: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappedRelationshipSchema {
    pub relationship_type: &'static str,
    pub source_type: &'static str,
    pub class: RelationshipClass,
    pub target_type: &'static str,
    pub direction: RelationshipDirection,
}
