//! Static values that take part in fingerprint computation.

/// Logical scheduler version, folded into the run fingerprint.
pub const SCHEDULER_VERSION: &str = "R1.0";

/// Name of the entity key attribute.
pub const KEY_FIELD: &str = "_key";
/// Name of the entity/relationship type attribute.
pub const TYPE_FIELD: &str = "_type";
/// Name of the class attribute.
pub const CLASS_FIELD: &str = "_class";
