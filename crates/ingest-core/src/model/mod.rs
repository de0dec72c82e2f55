//! Graph model: entities, direct relationships, mapped (deferred)
//! relationships and the type schemas steps declare.

pub mod entity;
pub mod relationship;
pub mod schema;

pub use entity::Entity;
pub use relationship::{DirectRelationship, MappedRelationship, Relationship, RelationshipClass,
                       RelationshipDirection, RelationshipMapping};
pub use schema::{EntitySchema, MappedRelationshipSchema, RelationshipSchema};
