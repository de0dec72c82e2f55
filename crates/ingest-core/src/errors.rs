//! Error taxonomy of the ingestion core.
//!
//! Structural errors (duplicate keys, invalid step graph, undeclared writes)
//! always abort the affected scope. Record-level errors may be logged and
//! skipped by a step when the record only enriches the graph.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub enum GraphCoreError {
    #[error("malformed identity for {kind}: {reason}")]
    MalformedIdentity { kind: String, reason: String },
    #[error("duplicate entity key: {key}")]
    DuplicateEntity { key: String },
    #[error("duplicate relationship key: {key}")]
    DuplicateRelationship { key: String },
    #[error("missing dependency data: {0}")]
    MissingDependencyData(String),
    #[error("invalid step graph: {0}")]
    InvalidStepGraph(String),
    #[error("external source error: {0}")]
    ExternalSource(String),
    #[error("invalid mapped relationship {key}: {reason}")]
    InvalidMappedRelationship { key: String, reason: String },
    #[error("invalid relationship {key}: {reason}")]
    InvalidRelationship { key: String, reason: String },
    #[error("invalid property {property} on {key}: only scalars and arrays of scalars are allowed")]
    InvalidProperty { key: String, property: String },
    #[error("step {step_id} did not declare type {type_name}")]
    UndeclaredType { step_id: String, type_name: String },
    #[error("relationship {key} references unknown entity {missing}")]
    DanglingRelationship { key: String, missing: String },
    #[error("run cancelled")]
    Cancelled,
    #[error("internal: {0}")]
    Internal(String),
}

pub type CoreResult<T> = Result<T, GraphCoreError>;

impl GraphCoreError {
    pub fn malformed(kind: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedIdentity { kind: kind.into(),
                                  reason: reason.into() }
    }
}

/// Coarse classification used for logging and run reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorClass {
    /// Store or graph invariant violated; indicates a defect.
    Structural,
    /// A single record could not be keyed or decoded.
    Record,
    /// Data expected from an earlier step is absent.
    Dependency,
    /// Failure bubbled up from the external data source.
    External,
    Cancelled,
    Internal,
}

pub fn classify_error(err: &GraphCoreError) -> ErrorClass {
    match err {
        GraphCoreError::DuplicateEntity { .. }
        | GraphCoreError::DuplicateRelationship { .. }
        | GraphCoreError::InvalidStepGraph(_)
        | GraphCoreError::InvalidMappedRelationship { .. }
        | GraphCoreError::InvalidRelationship { .. }
        | GraphCoreError::InvalidProperty { .. }
        | GraphCoreError::UndeclaredType { .. }
        | GraphCoreError::DanglingRelationship { .. } => ErrorClass::Structural,
        GraphCoreError::MalformedIdentity { .. } => ErrorClass::Record,
        GraphCoreError::MissingDependencyData(_) => ErrorClass::Dependency,
        GraphCoreError::ExternalSource(_) => ErrorClass::External,
        GraphCoreError::Cancelled => ErrorClass::Cancelled,
        GraphCoreError::Internal(_) => ErrorClass::Internal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_formats_are_stable() {
        let err = GraphCoreError::DuplicateEntity { key: "snyk_org:1".into() };
        assert_eq!(err.to_string(), "duplicate entity key: snyk_org:1");
        let err = GraphCoreError::malformed("role", "empty name");
        assert_eq!(err.to_string(), "malformed identity for role: empty name");
    }

    #[test]
    fn classification_separates_structural_from_record_errors() {
        assert_eq!(classify_error(&GraphCoreError::DuplicateRelationship { key: "a|has|b".into() }),
                   ErrorClass::Structural);
        assert_eq!(classify_error(&GraphCoreError::malformed("cve", "bad")), ErrorClass::Record);
        assert_eq!(classify_error(&GraphCoreError::ExternalSource("503".into())), ErrorClass::External);
    }
}
