//! Identity & key policy.
//!
//! Pure functions that turn the semantic identity of a record (vendor id,
//! parent id, role name, ...) into the string key used by the job state.
//! Re-running the pipeline against unchanged upstream data must yield the
//! same keys, so every function here is deterministic and fails loudly on
//! input it cannot key unambiguously.
//!
//! Key shapes:
//!
//! ```text
//! entity (vendor id)       <vendor>:<id>
//! entity (child of parent) <kind>:<parentId>-<childId>
//! direct relationship      <fromKey>|<verb>|<toKey>
//! mapped relationship      <sourceKey>|<verb>|<targetKey>
//! ```

pub mod keys;
pub mod parse;

pub use keys::{child_key, direct_relationship_key, mapped_relationship_key, mapped_target_key, relationship_type,
               vendor_key, KEY_SEPARATOR, NAMESPACE_SEPARATOR};
pub use parse::normalize_slug;
