//! In-memory index of source entities, keyed by declared source type

use super::entity::SourceEntity;
use super::traits::LinkProcessorError;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Entities of one source type, keyed by entity id
pub type EntitiesById = BTreeMap<String, Arc<SourceEntity>>;

/// Two-level map `type -> id -> entity`, scoped to one replication run.
///
/// A type is present once it has been registered, even if no entity of
/// that type was found.
#[derive(Debug, Default)]
pub struct SourceEntityCache {
    by_type: BTreeMap<String, EntitiesById>,
}

impl SourceEntityCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a type as populated
    pub fn register_type(&mut self, entity_type: impl Into<String>) {
        self.by_type.entry(entity_type.into()).or_default();
    }

    /// Index an entity. The first entity stored under an id wins, as it
    /// does for CIs in the topology accumulator.
    pub fn add_entity(&mut self, entity_type: impl Into<String>, entity: Arc<SourceEntity>) {
        let entity_type = entity_type.into();
        let entities = self.by_type.entry(entity_type.clone()).or_default();
        match entities.entry(entity.id().to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(entity);
            }
            Entry::Occupied(_) => {
                tracing::debug!(%entity_type, id = entity.id(), "duplicate source entity ignored");
            }
        }
    }

    pub fn get_by_type(&self, entity_type: &str) -> Option<&EntitiesById> {
        self.by_type.get(entity_type)
    }

    /// Like `get_by_type`, failing for a type that was never populated
    pub fn require_type(&self, entity_type: &str) -> Result<&EntitiesById, LinkProcessorError> {
        self.get_by_type(entity_type)
            .ok_or_else(|| LinkProcessorError::MissingSourceType(entity_type.to_string()))
    }

    pub fn get_ids_by_type(&self, entity_type: &str) -> BTreeSet<String> {
        self.by_type
            .get(entity_type)
            .map(|entities| entities.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn entity(&self, entity_type: &str, id: &str) -> Option<&Arc<SourceEntity>> {
        self.by_type.get(entity_type).and_then(|entities| entities.get(id))
    }

    pub fn contains_type(&self, entity_type: &str) -> bool {
        self.by_type.contains_key(entity_type)
    }

    pub fn type_count(&self) -> usize {
        self.by_type.len()
    }

    pub fn entity_count(&self) -> usize {
        self.by_type.values().map(BTreeMap::len).sum()
    }
}
