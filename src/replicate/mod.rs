//! Replicator: the end-to-end pull pipeline
//!
//! 1. For each CI mapping, in order: fetch source entities, index them in
//!    the source entity cache, materialize CIs, store them in the
//!    accumulator.
//! 2. For each link mapping: run its link processor over the cache and
//!    record the links, applying failure policies.
//! 3. Resolve pending links into typed links.
//! 4. Validate dependencies once over everything accumulated.
//! 5. Emit the final topology.
//!
//! Per-record and per-link-mapping problems are logged and counted in the
//! [`ReplicationReport`]; only source-system failures abort a run.

use crate::coerce::AttributeCatalog;
use crate::emit::FinalTopology;
use crate::graph::{LinkOutcome, TopologyAccumulator};
use crate::mapping::{LinkMapping, Mappings};
use crate::materialize::materialize;
use crate::resolve::resolve_links;
use crate::source::{
    BuiltinProcessor, LinkProcessor, LinkProcessorError, SourceEntityCache, SourceError,
    SourceSystem,
};
use crate::validate::DependencyValidator;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;

#[cfg(test)]
mod integration_tests;

/// Errors that abort a replication run
#[derive(Debug, Error)]
pub enum ReplicationError {
    #[error("failed to read '{source_type}' from source system: {error}")]
    Source {
        source_type: String,
        #[source]
        error: SourceError,
    },
}

/// What happened during one replication run
#[derive(Debug, Clone, Serialize)]
pub struct ReplicationReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Source entities read across all CI mappings
    pub entities_read: usize,
    pub cis_materialized: usize,
    /// CIs skipped by validators or coercion errors
    pub cis_skipped: usize,
    /// Entities or CIs sharing an identity with an earlier one
    pub cis_duplicate: usize,
    /// CIs removed by link failure policies
    pub cis_excluded: usize,
    /// CIs removed by dependency validation
    pub cis_discarded: usize,
    pub links_reported: usize,
    pub links_dropped: usize,
    pub links_built: usize,
    /// Built links removed because an end was discarded
    pub links_pruned: usize,
    /// Link mappings that could not be processed, with the reason
    pub link_mapping_failures: Vec<(String, String)>,
}

impl ReplicationReport {
    fn start() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            entities_read: 0,
            cis_materialized: 0,
            cis_skipped: 0,
            cis_duplicate: 0,
            cis_excluded: 0,
            cis_discarded: 0,
            links_reported: 0,
            links_dropped: 0,
            links_built: 0,
            links_pruned: 0,
            link_mapping_failures: Vec::new(),
        }
    }

    /// True if every link mapping could be processed
    pub fn is_complete(&self) -> bool {
        self.link_mapping_failures.is_empty()
    }
}

/// Result of a successful replication run
#[derive(Debug, Clone)]
pub struct Replication {
    pub topology: FinalTopology,
    pub report: ReplicationReport,
}

/// Replicates a source system's topology according to a mapping definition
pub struct Replicator {
    mappings: Mappings,
    catalog: Arc<dyn AttributeCatalog>,
}

impl Replicator {
    pub fn new(mappings: Mappings, catalog: Arc<dyn AttributeCatalog>) -> Self {
        Self { mappings, catalog }
    }

    /// Run the full pipeline against `source`
    pub async fn replicate_topology(
        &self,
        source: &dyn SourceSystem,
    ) -> Result<Replication, ReplicationError> {
        let mut report = ReplicationReport::start();
        let mut cache = SourceEntityCache::new();
        let mut acc = TopologyAccumulator::new();

        for (mapping_idx, ci_mapping) in self.mappings.ci_mappings.iter().enumerate() {
            let source_type = &ci_mapping.source_type;
            let entities = source
                .get_cis(source_type, ci_mapping, &self.mappings)
                .await
                .map_err(|error| ReplicationError::Source {
                    source_type: source_type.clone(),
                    error,
                })?;
            report.entities_read += entities.len();

            // One entity per id, the same one the cache and the accumulator keep
            let mut seen = HashSet::new();
            let (entities, repeated): (Vec<_>, Vec<_>) = entities
                .into_iter()
                .partition(|entity| seen.insert(entity.id().to_string()));
            if !repeated.is_empty() {
                tracing::warn!(
                    source_type = %source_type,
                    count = repeated.len(),
                    "source entities with a repeated id ignored"
                );
                report.cis_duplicate += repeated.len();
            }

            cache.register_type(source_type);
            for entity in &entities {
                cache.add_entity(source_type, entity.clone());
            }

            let outcome = materialize(ci_mapping, &entities, self.catalog.as_ref());
            report.cis_skipped += outcome.skipped.len();
            for (ci, entity) in outcome.built {
                match acc.add_ci(ci, entity, source_type, mapping_idx) {
                    Some(_) => report.cis_materialized += 1,
                    None => report.cis_duplicate += 1,
                }
            }
        }

        for (mapping_idx, link_mapping) in self.mappings.link_mappings.iter().enumerate() {
            let links = match self.collect_links(source, link_mapping, &cache).await {
                Ok(links) => links,
                Err(e) => {
                    tracing::warn!(link = %link_mapping.name(), error = %e, "link mapping failed");
                    report
                        .link_mapping_failures
                        .push((link_mapping.name(), e.to_string()));
                    continue;
                }
            };

            report.links_reported += links.len();
            for link in links {
                match acc.add_link(mapping_idx, link_mapping, link) {
                    LinkOutcome::Pending => {}
                    LinkOutcome::Excluded(ids) => {
                        report.links_dropped += 1;
                        report.cis_excluded += ids.len();
                    }
                    LinkOutcome::Dropped => report.links_dropped += 1,
                }
            }
        }

        let stats = resolve_links(&mut acc, &self.mappings.link_mappings);
        report.links_built = stats.built;
        report.links_dropped += stats.stale;

        let validation = DependencyValidator::new(&acc, &self.mappings.ci_mappings).run();
        report.cis_discarded = validation.discarded.len();
        report.links_pruned = acc.link_count() - validation.links.len();

        let topology = FinalTopology::emit(acc, &validation);
        report.finished_at = Some(Utc::now());

        tracing::info!(
            source = source.id(),
            cis = topology.ci_count(),
            links = topology.link_count(),
            skipped = report.cis_skipped,
            excluded = report.cis_excluded,
            discarded = report.cis_discarded,
            failed_link_mappings = report.link_mapping_failures.len(),
            "topology replicated"
        );

        Ok(Replication { topology, report })
    }

    async fn collect_links(
        &self,
        source: &dyn SourceSystem,
        link_mapping: &LinkMapping,
        cache: &SourceEntityCache,
    ) -> Result<Vec<crate::graph::SourceLink>, LinkProcessorError> {
        for end_type in [&link_mapping.source_end1_type, &link_mapping.source_end2_type] {
            cache.require_type(end_type)?;
        }

        let processor: Box<dyn LinkProcessor> = match source.create_link_processor(link_mapping) {
            Some(processor) => processor,
            None => Box::new(BuiltinProcessor::for_mapping(link_mapping)?),
        };
        processor.get_links(cache).await
    }
}
