//! In-memory source system backed by JSON records
//!
//! Records are grouped by source type. A record may nest child records
//! under a `children` object, keyed by child type; nested records get the
//! enclosing record as their parent:
//!
//! ```json
//! {
//!   "host": [
//!     { "name": "web01", "children": { "disk": [ { "device": "sda" } ] } }
//!   ]
//! }
//! ```
//!
//! Records of the requested type use the id key of the requesting CI
//! mapping. Ancestors use the key registered with [`MemorySourceSystem::with_id_key`],
//! then the key of the first CI mapping reading their type, then `"id"`.

use super::entity::SourceEntity;
use super::traits::{SourceError, SourceSystem};
use crate::mapping::{CiMapping, Mappings};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

/// Key holding nested child records
const CHILDREN_KEY: &str = "children";

/// The requested source type and the mapping requesting it
type Wanted<'a> = (&'a str, &'a CiMapping);

/// Source system serving records held in memory
#[derive(Debug, Clone, Default)]
pub struct MemorySourceSystem {
    id: String,
    records: BTreeMap<String, Vec<Value>>,
    /// Id keys for ancestor types, which are built without their own mapping
    id_keys: HashMap<String, String>,
}

impl MemorySourceSystem {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn with_records(mut self, source_type: impl Into<String>, records: Vec<Value>) -> Self {
        self.records.entry(source_type.into()).or_default().extend(records);
        self
    }

    pub fn with_id_key(mut self, source_type: impl Into<String>, id_key: impl Into<String>) -> Self {
        self.id_keys.insert(source_type.into(), id_key.into());
        self
    }

    /// Build from a `{ "<type>": [records] }` document
    pub fn from_json(id: impl Into<String>, document: Value) -> Result<Self, SourceError> {
        let Value::Object(groups) = document else {
            return Err(SourceError::Malformed(
                "expected an object keyed by source type".to_string(),
            ));
        };
        let mut system = Self::new(id);
        for (source_type, records) in groups {
            match records {
                Value::Array(records) => system = system.with_records(source_type, records),
                _ => {
                    return Err(SourceError::Malformed(format!(
                        "records of '{}' must be an array",
                        source_type
                    )))
                }
            }
        }
        Ok(system)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let document: Value = serde_json::from_str(&text)?;
        Self::from_json(path.display().to_string(), document)
    }

    fn id_key_for(&self, source_type: &str, wanted: Wanted<'_>, mappings: &Mappings) -> String {
        if source_type == wanted.0 {
            return wanted.1.id_key.clone();
        }
        self.id_keys
            .get(source_type)
            .map(String::as_str)
            .or_else(|| mappings.id_key_for(source_type))
            .unwrap_or("id")
            .to_string()
    }

    /// Walk a record and its nested children, collecting entities of `wanted`
    fn collect(
        &self,
        source_type: &str,
        record: &Value,
        parent: Option<&Arc<SourceEntity>>,
        wanted: Wanted<'_>,
        mappings: &Mappings,
        out: &mut Vec<Arc<SourceEntity>>,
    ) -> Result<(), SourceError> {
        let Value::Object(fields) = record else {
            return Err(SourceError::Malformed(format!(
                "record of '{}' is not an object",
                source_type
            )));
        };

        let mut own_fields: Map<String, Value> = fields.clone();
        let children = own_fields.remove(CHILDREN_KEY);

        let id_key = self.id_key_for(source_type, wanted, mappings);
        let mut entity = SourceEntity::new(source_type, own_fields, id_key);
        if let Some(parent) = parent {
            entity = entity.with_parent(parent.clone());
        }
        let entity = Arc::new(entity);

        if source_type == wanted.0 {
            out.push(entity.clone());
        }

        if let Some(Value::Object(groups)) = children {
            for (child_type, child_records) in groups {
                let Value::Array(child_records) = child_records else {
                    return Err(SourceError::Malformed(format!(
                        "children '{}' of '{}' must be an array",
                        child_type, source_type
                    )));
                };
                for child in &child_records {
                    self.collect(&child_type, child, Some(&entity), wanted, mappings, out)?;
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl SourceSystem for MemorySourceSystem {
    fn id(&self) -> &str {
        &self.id
    }

    async fn get_cis(
        &self,
        source_type: &str,
        ci_mapping: &CiMapping,
        mappings: &Mappings,
    ) -> Result<Vec<Arc<SourceEntity>>, SourceError> {
        let mut entities = Vec::new();
        for (record_type, records) in &self.records {
            for record in records {
                self.collect(
                    record_type,
                    record,
                    None,
                    (source_type, ci_mapping),
                    mappings,
                    &mut entities,
                )?;
            }
        }
        tracing::debug!(
            source = %self.id,
            source_type,
            count = entities.len(),
            "read source records"
        );
        Ok(entities)
    }
}
