//! Resolution of mapped (deferred) relationships into concrete edges.

mod resolver;

pub use resolver::{MappedRelationshipResolver, Resolution, ResolvedMappedRelationship};
