//! Built-in link processors
//!
//! Selected by the `processor` field of a link mapping:
//!
//! - `reference:<field>`: each end1 entity's `<field>` holds the id (or a
//!   list of ids) of end2 entities
//! - `back_reference:<field>`: each end2 entity's `<field>` holds end1 ids
//! - `parent`: each end2 entity whose parent is an end1 entity
//!
//! Links are reported as found; whether both ends became CIs is decided
//! later by the topology accumulator.

use super::cache::SourceEntityCache;
use super::entity::value_to_id;
use super::traits::{LinkProcessor, LinkProcessorError};
use crate::graph::SourceLink;
use crate::mapping::LinkMapping;
use async_trait::async_trait;
use serde_json::Value;
use std::str::FromStr;

/// Cross-reference strategy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkStrategy {
    Reference(String),
    BackReference(String),
    Parent,
}

impl FromStr for LinkStrategy {
    type Err = LinkProcessorError;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let unrecognized = || LinkProcessorError::UnrecognizedLinkProcessor(spec.to_string());
        match spec.trim().split_once(':') {
            Some(("reference", field)) if !field.trim().is_empty() => {
                Ok(Self::Reference(field.trim().to_string()))
            }
            Some(("back_reference", field)) if !field.trim().is_empty() => {
                Ok(Self::BackReference(field.trim().to_string()))
            }
            None if spec.trim() == "parent" => Ok(Self::Parent),
            _ => Err(unrecognized()),
        }
    }
}

/// Ids named by a reference field: a scalar or a list of scalars
fn referenced_ids(value: &Value) -> Vec<String> {
    match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items
            .iter()
            .filter(|v| !v.is_null())
            .map(value_to_id)
            .collect(),
        other => vec![value_to_id(other)],
    }
}

/// Link processor driven by a [`LinkStrategy`]
#[derive(Debug, Clone)]
pub struct BuiltinProcessor {
    strategy: LinkStrategy,
    end1_type: String,
    end2_type: String,
}

impl BuiltinProcessor {
    pub fn for_mapping(link_mapping: &LinkMapping) -> Result<Self, LinkProcessorError> {
        Ok(Self {
            strategy: link_mapping.processor.parse()?,
            end1_type: link_mapping.source_end1_type.clone(),
            end2_type: link_mapping.source_end2_type.clone(),
        })
    }

    fn collect(&self, cache: &SourceEntityCache) -> Result<Vec<SourceLink>, LinkProcessorError> {
        let end1s = cache.require_type(&self.end1_type)?;
        let end2s = cache.require_type(&self.end2_type)?;

        let links = match &self.strategy {
            LinkStrategy::Reference(field) => end1s
                .values()
                .flat_map(|end1| {
                    end1.field(field)
                        .map(referenced_ids)
                        .unwrap_or_default()
                        .into_iter()
                        .map(move |end2_id| SourceLink::new(end1.id(), end2_id))
                })
                .collect(),
            LinkStrategy::BackReference(field) => end2s
                .values()
                .flat_map(|end2| {
                    end2.field(field)
                        .map(referenced_ids)
                        .unwrap_or_default()
                        .into_iter()
                        .map(move |end1_id| SourceLink::new(end1_id, end2.id()))
                })
                .collect(),
            LinkStrategy::Parent => end2s
                .values()
                .filter_map(|end2| {
                    end2.parent()
                        .filter(|parent| parent.entity_type() == self.end1_type)
                        .map(|parent| SourceLink::new(parent.id(), end2.id()))
                })
                .collect(),
        };
        Ok(links)
    }
}

#[async_trait]
impl LinkProcessor for BuiltinProcessor {
    async fn get_links(&self, cache: &SourceEntityCache) -> Result<Vec<SourceLink>, LinkProcessorError> {
        self.collect(cache)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceEntity;
    use serde_json::json;
    use std::sync::Arc;

    fn entity(entity_type: &str, value: Value) -> Arc<SourceEntity> {
        Arc::new(SourceEntity::from_value(entity_type, value, "id").unwrap())
    }

    fn cache() -> SourceEntityCache {
        let host = entity("host", json!({"id": "h1", "apps": ["a1", "a2"]}));
        let mut cache = SourceEntityCache::new();
        cache.add_entity("host", host.clone());
        cache.add_entity("app", entity("app", json!({"id": "a1", "host": "h1"})));
        cache.add_entity("app", entity("app", json!({"id": "a2", "host": "h1"})));
        let disk = SourceEntity::from_value("disk", json!({"id": "d1"}), "id")
            .unwrap()
            .with_parent(host);
        cache.add_entity("disk", Arc::new(disk));
        cache
    }

    fn mapping(end1: &str, end2: &str, processor: &str) -> LinkMapping {
        LinkMapping::new(end1, "node", end2, "running_software", "composition")
            .with_processor(processor)
    }

    #[test]
    fn parses_strategies() {
        assert_eq!(
            "reference:apps".parse::<LinkStrategy>().unwrap(),
            LinkStrategy::Reference("apps".into())
        );
        assert_eq!("parent".parse::<LinkStrategy>().unwrap(), LinkStrategy::Parent);
        assert!(matches!(
            "sql:select".parse::<LinkStrategy>(),
            Err(LinkProcessorError::UnrecognizedLinkProcessor(_))
        ));
        assert!("reference:".parse::<LinkStrategy>().is_err());
        assert!("".parse::<LinkStrategy>().is_err());
    }

    #[tokio::test]
    async fn reference_follows_id_lists() {
        let processor = BuiltinProcessor::for_mapping(&mapping("host", "app", "reference:apps")).unwrap();
        let links = processor.get_links(&cache()).await.unwrap();
        assert_eq!(links, vec![SourceLink::new("h1", "a1"), SourceLink::new("h1", "a2")]);
    }

    #[tokio::test]
    async fn back_reference_reads_end2_fields() {
        let processor =
            BuiltinProcessor::for_mapping(&mapping("host", "app", "back_reference:host")).unwrap();
        let links = processor.get_links(&cache()).await.unwrap();
        assert_eq!(links, vec![SourceLink::new("h1", "a1"), SourceLink::new("h1", "a2")]);
    }

    #[tokio::test]
    async fn parent_links_children_to_parents() {
        let processor = BuiltinProcessor::for_mapping(&mapping("host", "disk", "parent")).unwrap();
        let links = processor.get_links(&cache()).await.unwrap();
        assert_eq!(links, vec![SourceLink::new("h1", "d1")]);
    }

    #[tokio::test]
    async fn missing_type_fails_the_mapping() {
        let processor = BuiltinProcessor::for_mapping(&mapping("host", "lun", "parent")).unwrap();
        let err = processor.get_links(&cache()).await.unwrap_err();
        assert_eq!(err, LinkProcessorError::MissingSourceType("lun".into()));
    }
}
