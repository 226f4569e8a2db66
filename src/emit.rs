//! Topology Emitter: the final CI and link collection
//!
//! Surviving CIs are renumbered densely in arena order. Links and
//! container references are rewritten to the new positions, so the
//! topology is self-contained and can be serialized as is.

use crate::graph::{BuiltLink, CiIndex, ComplexId, TargetCi, TopologyAccumulator};
use crate::validate::Validation;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A CI in the final topology
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopologyCi {
    pub id: ComplexId,
    #[serde(flatten)]
    pub ci: TargetCi,
}

/// The structurally consistent result of one replication
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinalTopology {
    cis: Vec<TopologyCi>,
    /// Link ends index into `cis`
    links: Vec<BuiltLink>,
}

impl FinalTopology {
    /// Keep the CIs and links the validation kept
    pub fn emit(acc: TopologyAccumulator, validation: &Validation) -> Self {
        let (slots, built) = acc.into_parts();

        let mut renumbered: HashMap<CiIndex, CiIndex> = HashMap::new();
        let mut cis = Vec::new();
        for (i, slot) in slots.into_iter().enumerate() {
            let old = CiIndex::new(i);
            let Some(slot) = slot else { continue };
            if !validation.keeps(old) {
                continue;
            }
            renumbered.insert(old, CiIndex::new(cis.len()));
            cis.push(TopologyCi {
                id: slot.id,
                ci: slot.ci,
            });
        }

        // A container that did not survive is dropped from the reference
        for entry in &mut cis {
            entry.ci.container = entry
                .ci
                .container
                .and_then(|old| renumbered.get(&old).copied());
        }

        let links = validation
            .links
            .iter()
            .filter_map(|&i| built.get(i))
            .filter_map(|link| {
                Some(BuiltLink::new(
                    link.link_type.clone(),
                    *renumbered.get(&link.end1)?,
                    *renumbered.get(&link.end2)?,
                ))
            })
            .collect();

        Self { cis, links }
    }

    pub fn cis(&self) -> &[TopologyCi] {
        &self.cis
    }

    pub fn links(&self) -> &[BuiltLink] {
        &self.links
    }

    pub fn ci_count(&self) -> usize {
        self.cis.len()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cis.is_empty()
    }

    pub fn get(&self, id: &ComplexId) -> Option<&TopologyCi> {
        self.cis.iter().find(|entry| entry.id == *id)
    }

    pub fn contains(&self, id: &ComplexId) -> bool {
        self.get(id).is_some()
    }

    pub fn find_by_type<'a>(&'a self, ci_type: &'a str) -> impl Iterator<Item = &'a TopologyCi> + 'a {
        self.cis.iter().filter(move |entry| entry.ci.ci_type == ci_type)
    }

    /// Both ends of a link
    pub fn link_ends(&self, link: &BuiltLink) -> Option<(&TopologyCi, &TopologyCi)> {
        Some((self.cis.get(link.end1.index())?, self.cis.get(link.end2.index())?))
    }

    /// Whether a link of `link_type` runs from `end1` to `end2`
    pub fn has_link(&self, link_type: &str, end1: &ComplexId, end2: &ComplexId) -> bool {
        self.links.iter().any(|link| {
            link.link_type == link_type
                && self
                    .link_ends(link)
                    .map(|(a, b)| a.id == *end1 && b.id == *end2)
                    .unwrap_or(false)
        })
    }
}
