use serde_json::Value;

use crate::errors::{CoreResult, GraphCoreError};
use crate::model::RelationshipClass;

/// Separates the endpoints and verb of a relationship key.
pub const KEY_SEPARATOR: char = '|';
/// Separates an entity kind from its identifying part.
pub const NAMESPACE_SEPARATOR: char = ':';

/// Validates one identifying component. Components may not be blank, carry
/// surrounding whitespace, or contain the relationship separator (a key
/// containing `|` could be parsed as a relationship key).
fn component<'a>(kind: &str, field: &str, value: &'a str) -> CoreResult<&'a str> {
    if value.trim().is_empty() {
        return Err(GraphCoreError::malformed(kind, format!("{field} is empty")));
    }
    if value.trim() != value {
        return Err(GraphCoreError::malformed(kind, format!("{field} has surrounding whitespace: {value:?}")));
    }
    if value.contains(KEY_SEPARATOR) {
        return Err(GraphCoreError::malformed(kind, format!("{field} contains '{KEY_SEPARATOR}': {value}")));
    }
    if value.chars().any(char::is_control) {
        return Err(GraphCoreError::malformed(kind, format!("{field} contains control characters")));
    }
    Ok(value)
}

fn namespace<'a>(kind: &str, value: &'a str) -> CoreResult<&'a str> {
    let ns = component(kind, "namespace", value)?;
    if ns.contains(NAMESPACE_SEPARATOR) {
        return Err(GraphCoreError::malformed(kind, format!("namespace contains '{NAMESPACE_SEPARATOR}': {ns}")));
    }
    Ok(ns)
}

/// `<vendor>:<id>`
pub fn vendor_key(vendor: &str, id: &str) -> CoreResult<String> {
    let vendor = namespace(vendor, vendor)?;
    let id = component(vendor, "id", id)?;
    Ok(format!("{vendor}{NAMESPACE_SEPARATOR}{id}"))
}

/// `<kind>:<parentId>-<childId>`
pub fn child_key(kind: &str, parent_id: &str, child_id: &str) -> CoreResult<String> {
    let kind = namespace(kind, kind)?;
    let parent = component(kind, "parent id", parent_id)?;
    let child = component(kind, "child id", child_id)?;
    Ok(format!("{kind}{NAMESPACE_SEPARATOR}{parent}-{child}"))
}

/// `<fromKey>|<verb>|<toKey>`
pub fn direct_relationship_key(from_key: &str, class: RelationshipClass, to_key: &str) -> String {
    format!("{from_key}{KEY_SEPARATOR}{}{KEY_SEPARATOR}{to_key}", class.verb())
}

/// `<sourceKey>|<verb>|<targetKey>`; the verb follows the semantic class
/// (`is`, `exploits`, `scans`, ...).
pub fn mapped_relationship_key(source_key: &str, class: RelationshipClass, target_key: &str) -> String {
    format!("{source_key}{KEY_SEPARATOR}{}{KEY_SEPARATOR}{target_key}", class.verb())
}

/// Default relationship `_type`: `<fromType>_<verb>_<toType>`.
pub fn relationship_type(from_type: &str, class: RelationshipClass, to_type: &str) -> String {
    format!("{from_type}_{}_{to_type}", class.verb())
}

/// Key for a mapped-relationship target whose payload carries no `_key`:
/// `<targetType>:<v1>-<v2>...` built from the values of its first filter-key
/// set. Strings are used verbatim, other scalars through their JSON form.
pub fn mapped_target_key(target_type: &str, values: &[Value]) -> CoreResult<String> {
    let kind = namespace(target_type, target_type)?;
    if values.is_empty() {
        return Err(GraphCoreError::malformed(kind, "no filter values to derive a target key from"));
    }
    let mut parts = Vec::with_capacity(values.len());
    for v in values {
        let part = match v {
            Value::String(s) => s.clone(),
            Value::Null => return Err(GraphCoreError::malformed(kind, "filter value is null")),
            Value::Array(_) | Value::Object(_) => {
                return Err(GraphCoreError::malformed(kind, format!("filter value is not a scalar: {v}")))
            }
            other => other.to_string(),
        };
        parts.push(component(kind, "filter value", &part)?.to_string());
    }
    Ok(format!("{kind}{NAMESPACE_SEPARATOR}{}", parts.join("-")))
}
