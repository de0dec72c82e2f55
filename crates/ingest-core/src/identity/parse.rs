//! Normalization of human-readable identifying names.

use crate::errors::{CoreResult, GraphCoreError};
use crate::identity::{KEY_SEPARATOR, NAMESPACE_SEPARATOR};

/// Lowercases a human-readable name and joins its words with `-`.
///
/// Punctuation is kept. Only an empty name, the key separators and control
/// characters are rejected: those cannot be keyed without ambiguity.
pub fn normalize_slug(kind: &str, value: &str) -> CoreResult<String> {
    let words: Vec<&str> = value.split_whitespace().collect();
    if words.is_empty() {
        return Err(GraphCoreError::malformed(kind, "name is empty"));
    }
    let slug = words.join("-").to_lowercase();
    if let Some(bad) = slug.chars().find(|c| *c == KEY_SEPARATOR || *c == NAMESPACE_SEPARATOR || c.is_control()) {
        return Err(GraphCoreError::malformed(kind, format!("{value:?} contains unsupported character {bad:?}")));
    }
    Ok(slug)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_is_stable() {
        assert_eq!(normalize_slug("role", "Org  Admin").unwrap(), "org-admin");
        assert_eq!(normalize_slug("role", "collaborator").unwrap(), "collaborator");
    }

    #[test]
    fn slug_keeps_punctuation() {
        assert_eq!(normalize_slug("role", "Org Viewer (custom)").unwrap(), "org-viewer-(custom)");
        assert_eq!(normalize_slug("role", "Read.Only/Auditor").unwrap(), "read.only/auditor");
    }

    #[test]
    fn slug_rejects_ambiguous_names() {
        assert!(normalize_slug("role", "   ").is_err());
        assert!(normalize_slug("role", "admin:1234").is_err());
        assert!(normalize_slug("role", "admin|x").is_err());
        assert!(normalize_slug("role", "admin\u{7}").is_err());
    }
}
