//! Source system contract
//!
//! A source system reads raw records (shell output, REST payloads, CIM
//! instances) and hands them over as [`SourceEntity`] values. Cross-
//! references between records are extracted by link processors, which
//! read from the populated [`SourceEntityCache`].

use super::cache::SourceEntityCache;
use super::entity::SourceEntity;
use crate::graph::SourceLink;
use crate::mapping::{CiMapping, LinkMapping, Mappings};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Failures reading from a source system
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("source system unavailable: {0}")]
    Unavailable(String),

    #[error("failed to read source records: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed source records: {0}")]
    Malformed(String),

    #[error("failed to parse source records: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Failures processing one link mapping
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LinkProcessorError {
    #[error("link mapping references source type '{0}' which was never populated")]
    MissingSourceType(String),

    #[error("unrecognized link processor: '{0}'")]
    UnrecognizedLinkProcessor(String),
}

/// The contract source systems implement.
#[async_trait]
pub trait SourceSystem: Send + Sync {
    /// Identifier used in logs
    fn id(&self) -> &str;

    /// Fetch all records of `source_type`.
    ///
    /// `mappings` is the complete definition of the run. A source that
    /// builds records of other types along the way (ancestors of nested
    /// records) keys them the way their own CI mappings do.
    async fn get_cis(
        &self,
        source_type: &str,
        ci_mapping: &CiMapping,
        mappings: &Mappings,
    ) -> Result<Vec<Arc<SourceEntity>>, SourceError>;

    /// A system-specific processor for this link mapping.
    ///
    /// `None` selects the built-in processor named by the mapping.
    fn create_link_processor(&self, _link_mapping: &LinkMapping) -> Option<Box<dyn LinkProcessor>> {
        None
    }
}

/// Extracts cross-references for one link mapping
#[async_trait]
pub trait LinkProcessor: Send + Sync {
    async fn get_links(&self, cache: &SourceEntityCache) -> Result<Vec<SourceLink>, LinkProcessorError>;
}
