//! TopologyAccumulator: arena of materialized CIs and their links
//!
//! CIs are stored in slots addressed by [`CiIndex`] and looked up by
//! [`ComplexId`]. Removing a CI empties its slot; indices of other CIs
//! stay valid. Links are recorded first as pending (source ids resolved to
//! complex ids) and later as built links with an adjacency list per CI.

use super::ci::{CiIndex, ComplexId, TargetCi};
use super::link::{BuiltLink, PendingLink, SourceLink};
use crate::mapping::LinkMapping;
use crate::source::SourceEntity;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// A materialized CI with the record it came from
#[derive(Debug, Clone)]
pub struct CiSlot {
    pub id: ComplexId,
    pub ci: TargetCi,
    pub entity: Arc<SourceEntity>,
    /// Index of the CI mapping that built it
    pub mapping: usize,
}

/// What `add_link` did with a source link
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkOutcome {
    /// Both ends exist; the link awaits resolution
    Pending,
    /// An end was missing and the failure policy removed these CIs
    Excluded(Vec<ComplexId>),
    /// An end was missing and the link was dropped
    Dropped,
}

/// Accumulates CIs and links for one replication run
#[derive(Debug, Default)]
pub struct TopologyAccumulator {
    slots: Vec<Option<CiSlot>>,
    index: HashMap<ComplexId, CiIndex>,
    pending: Vec<PendingLink>,
    links: Vec<BuiltLink>,
    seen_links: HashSet<BuiltLink>,
    links_by_ci: HashMap<CiIndex, Vec<usize>>,
}

impl TopologyAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a CI under `ComplexId(entity id, source type, CI type)`.
    ///
    /// The first CI stored under an identity wins; returns `None` for a
    /// duplicate.
    pub fn add_ci(
        &mut self,
        ci: TargetCi,
        entity: Arc<SourceEntity>,
        source_type: &str,
        mapping: usize,
    ) -> Option<CiIndex> {
        let id = ComplexId::new(entity.id(), source_type, &ci.ci_type);
        if self.index.contains_key(&id) {
            tracing::debug!(%id, "duplicate CI ignored");
            return None;
        }
        let idx = CiIndex::new(self.slots.len());
        self.index.insert(id.clone(), idx);
        self.slots.push(Some(CiSlot {
            id,
            ci,
            entity,
            mapping,
        }));
        Some(idx)
    }

    /// Record a source link for `link_mapping`, applying its failure policy
    /// when either end has no CI.
    pub fn add_link(
        &mut self,
        mapping: usize,
        link_mapping: &LinkMapping,
        source_link: SourceLink,
    ) -> LinkOutcome {
        let end1 = ComplexId::new(
            &source_link.end1_id,
            &link_mapping.source_end1_type,
            &link_mapping.target_end1_type,
        );
        let end2 = ComplexId::new(
            &source_link.end2_id,
            &link_mapping.source_end2_type,
            &link_mapping.target_end2_type,
        );

        if self.has_ci(&end1) && self.has_ci(&end2) {
            self.pending.push(PendingLink {
                mapping,
                source_link,
                end1,
                end2,
            });
            return LinkOutcome::Pending;
        }

        let policy = link_mapping.failure_policy;
        let mut excluded = Vec::new();
        if policy.excludes_end1() && self.remove_ci(&end1).is_some() {
            excluded.push(end1);
        }
        if policy.excludes_end2() && self.remove_ci(&end2).is_some() {
            excluded.push(end2);
        }

        if excluded.is_empty() {
            LinkOutcome::Dropped
        } else {
            tracing::warn!(
                link = %link_mapping.name(),
                excluded = ?excluded,
                "link end missing, failure policy excluded CIs"
            );
            LinkOutcome::Excluded(excluded)
        }
    }

    pub fn has_ci(&self, id: &ComplexId) -> bool {
        self.index.contains_key(id)
    }

    pub fn index_of(&self, id: &ComplexId) -> Option<CiIndex> {
        self.index.get(id).copied()
    }

    /// Remove a CI entirely; later lookups by its identity fail
    pub fn remove_ci(&mut self, id: &ComplexId) -> Option<CiSlot> {
        let idx = self.index.remove(id)?;
        self.slots.get_mut(idx.index()).and_then(Option::take)
    }

    pub fn slot(&self, idx: CiIndex) -> Option<&CiSlot> {
        self.slots.get(idx.index()).and_then(Option::as_ref)
    }

    pub fn ci(&self, idx: CiIndex) -> Option<&TargetCi> {
        self.slot(idx).map(|slot| &slot.ci)
    }

    /// Live slots in arena order
    pub fn slots(&self) -> impl Iterator<Item = (CiIndex, &CiSlot)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|s| (CiIndex::new(i), s)))
    }

    /// Make `container` the container of `ci`
    pub fn set_container(&mut self, ci: CiIndex, container: CiIndex) {
        let Some(container_id) = self.slot(container).map(|s| s.id.clone()) else {
            return;
        };
        if let Some(Some(slot)) = self.slots.get_mut(ci.index()) {
            slot.ci.set_container(container, &container_id);
        }
    }

    /// Hand the pending links over for resolution
    pub fn take_pending(&mut self) -> Vec<PendingLink> {
        std::mem::take(&mut self.pending)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Record a built link against both of its ends.
    ///
    /// Returns false if an identical link was already recorded.
    pub fn record_link(&mut self, link: BuiltLink) -> bool {
        if !self.seen_links.insert(link.clone()) {
            return false;
        }
        let link_idx = self.links.len();
        self.links_by_ci.entry(link.end1).or_default().push(link_idx);
        if link.end2 != link.end1 {
            self.links_by_ci.entry(link.end2).or_default().push(link_idx);
        }
        self.links.push(link);
        true
    }

    pub fn links(&self) -> &[BuiltLink] {
        &self.links
    }

    pub fn link(&self, link_idx: usize) -> Option<&BuiltLink> {
        self.links.get(link_idx)
    }

    /// Indices of built links touching `ci`, in recording order
    pub fn incident_links(&self, ci: CiIndex) -> &[usize] {
        self.links_by_ci.get(&ci).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn ci_count(&self) -> usize {
        self.index.len()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// Consume the accumulator, yielding its slots and built links
    pub fn into_parts(self) -> (Vec<Option<CiSlot>>, Vec<BuiltLink>) {
        (self.slots, self.links)
    }
}
