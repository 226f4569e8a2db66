//! Link Resolver: pending links -> typed CI-to-CI links
//!
//! Endpoints are re-checked at resolution time because a failure policy
//! applied after a link was recorded may have removed one of them.

use crate::graph::{is_composition_type, BuiltLink, TopologyAccumulator};
use crate::mapping::LinkMapping;

/// Counts from one resolution pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveStats {
    pub built: usize,
    /// Links whose endpoint disappeared after they were recorded
    pub stale: usize,
    /// Identical links reported more than once
    pub duplicates: usize,
}

/// Build every pending link recorded in the accumulator
pub fn resolve_links(acc: &mut TopologyAccumulator, link_mappings: &[LinkMapping]) -> ResolveStats {
    let mut stats = ResolveStats::default();

    for pending in acc.take_pending() {
        let Some(link_mapping) = link_mappings.get(pending.mapping) else {
            continue;
        };
        let (Some(end1), Some(end2)) = (acc.index_of(&pending.end1), acc.index_of(&pending.end2))
        else {
            tracing::debug!(
                link = %link_mapping.name(),
                end1 = %pending.end1,
                end2 = %pending.end2,
                "link endpoint removed before resolution"
            );
            stats.stale += 1;
            continue;
        };

        let (end1, end2) = if link_mapping.reverse {
            (end2, end1)
        } else {
            (end1, end2)
        };

        if is_composition_type(&link_mapping.target_type) || link_mapping.is_container {
            acc.set_container(end2, end1);
        }

        if acc.record_link(BuiltLink::new(&link_mapping.target_type, end1, end2)) {
            stats.built += 1;
        } else {
            stats.duplicates += 1;
        }
    }

    tracing::debug!(
        built = stats.built,
        stale = stats.stale,
        duplicates = stats.duplicates,
        "links resolved"
    );
    stats
}
