//! Source entities: raw records read from a source system

use serde_json::{Map, Value};
use std::sync::{Arc, OnceLock};

/// UUID v5 namespace for ids derived from record content
const ENTITY_NS: uuid::Uuid = uuid::Uuid::from_bytes([
    0x3e, 0x41, 0x9a, 0x72, 0x5c, 0x0d, 0x4b, 0x1f,
    0x8e, 0x27, 0x6a, 0xd0, 0x91, 0xc3, 0x55, 0x08,
]);

/// Render an id-bearing JSON value as a string
pub(crate) fn value_to_id(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// A raw record from a source system.
///
/// The id is the value of `raw_fields[id_key]`. Records without that field
/// get a deterministic hash of their parent's id and their own fields. The
/// id is computed once and memoized.
#[derive(Debug)]
pub struct SourceEntity {
    entity_type: String,
    raw_fields: Map<String, Value>,
    id_key: String,
    parent: Option<Arc<SourceEntity>>,
    id: OnceLock<String>,
}

impl SourceEntity {
    pub fn new(
        entity_type: impl Into<String>,
        raw_fields: Map<String, Value>,
        id_key: impl Into<String>,
    ) -> Self {
        Self {
            entity_type: entity_type.into(),
            raw_fields,
            id_key: id_key.into(),
            parent: None,
            id: OnceLock::new(),
        }
    }

    /// Build from a JSON object; other JSON values yield `None`
    pub fn from_value(
        entity_type: impl Into<String>,
        value: Value,
        id_key: impl Into<String>,
    ) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self::new(entity_type, fields, id_key)),
            _ => None,
        }
    }

    pub fn with_parent(mut self, parent: Arc<SourceEntity>) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    pub fn raw_fields(&self) -> &Map<String, Value> {
        &self.raw_fields
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.raw_fields.get(name)
    }

    pub fn parent(&self) -> Option<&Arc<SourceEntity>> {
        self.parent.as_ref()
    }

    /// The entity's identity, computed on first access
    pub fn id(&self) -> &str {
        self.id.get_or_init(|| self.compute_id())
    }

    fn compute_id(&self) -> String {
        match self.raw_fields.get(&self.id_key) {
            Some(value) if !value.is_null() => value_to_id(value),
            _ => {
                // serde_json::Map is ordered, so the rendering is stable
                let fields = Value::Object(self.raw_fields.clone()).to_string();
                let parent_id = self.parent.as_ref().map(|p| p.id()).unwrap_or("");
                let hash_input = format!("{}:{}", parent_id, fields);
                uuid::Uuid::new_v5(&ENTITY_NS, hash_input.as_bytes()).to_string()
            }
        }
    }
}
