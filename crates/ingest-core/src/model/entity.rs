use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::constants::{CLASS_FIELD, KEY_FIELD, TYPE_FIELD};
use crate::errors::{CoreResult, GraphCoreError};
use crate::hashing::hash_value;

/// Graph node. Serialized flat: reserved fields `_key`, `_type`, `_class`
/// followed by the open property map.
///
/// The raw source record travels with the entity into the store but is
/// never serialized and does not take part in the content hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    #[serde(rename = "_key")]
    pub key: String,
    #[serde(rename = "_type")]
    pub entity_type: String,
    #[serde(rename = "_class")]
    pub class: Vec<String>,
    #[serde(flatten)]
    pub properties: Map<String, Value>,
    #[serde(skip)]
    raw_data: Option<Arc<Value>>,
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
        && self.entity_type == other.entity_type
        && self.class == other.class
        && self.properties == other.properties
    }
}

impl Entity {
    pub fn new(key: impl Into<String>, entity_type: impl Into<String>, class: &[&str]) -> Self {
        Self { key: key.into(),
               entity_type: entity_type.into(),
               class: class.iter().map(|c| c.to_string()).collect(),
               properties: Map::new(),
               raw_data: None }
    }

    pub fn with_property(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.properties.insert(name.to_string(), value.into());
        self
    }

    /// Sets the property only when a value is present.
    pub fn with_optional<V: Into<Value>>(self, name: &str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.with_property(name, v),
            None => self,
        }
    }

    /// Attaches the record the entity was converted from.
    pub fn with_raw_data(mut self, raw: Value) -> Self {
        self.raw_data = Some(Arc::new(raw));
        self
    }

    pub fn raw_data(&self) -> Option<&Arc<Value>> {
        self.raw_data.as_ref()
    }

    /// Looks up a property, including the reserved `_key`, `_type` and
    /// `_class` fields (the latter as an array).
    pub fn property(&self, name: &str) -> Option<Value> {
        match name {
            KEY_FIELD => Some(Value::String(self.key.clone())),
            TYPE_FIELD => Some(Value::String(self.entity_type.clone())),
            CLASS_FIELD => Some(json!(self.class)),
            other => self.properties.get(other).cloned(),
        }
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.class.iter().any(|c| c == class)
    }

    /// Content hash over key, type, class and properties.
    pub fn content_hash(&self) -> String {
        hash_value(&json!({
            "_key": self.key,
            "_type": self.entity_type,
            "_class": self.class,
            "properties": self.properties,
        }))
    }

    /// Checks the reserved fields and that every property is a scalar or an
    /// array of scalars.
    pub fn validate(&self) -> CoreResult<()> {
        if self.key.trim().is_empty() {
            return Err(GraphCoreError::malformed(&self.entity_type, "entity key is empty"));
        }
        if self.entity_type.trim().is_empty() {
            return Err(GraphCoreError::malformed(&self.key, "entity type is empty"));
        }
        validate_properties(&self.key, &self.properties)
    }
}

pub(crate) fn validate_properties(key: &str, properties: &Map<String, Value>) -> CoreResult<()> {
    for (name, value) in properties {
        let ok = match value {
            Value::Object(_) => false,
            Value::Array(items) => items.iter().all(|v| !matches!(v, Value::Array(_) | Value::Object(_))),
            _ => true,
        };
        if !ok || [KEY_FIELD, TYPE_FIELD, CLASS_FIELD].contains(&name.as_str()) {
            return Err(GraphCoreError::InvalidProperty { key: key.to_string(),
                                                         property: name.clone() });
        }
    }
    Ok(())
}
