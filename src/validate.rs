//! Dependency Validator: the structurally consistent subset of the topology
//!
//! A CI whose mapping declares no requirement is standalone and always kept.
//! Any other CI is kept only if
//!
//! - its container exists and is itself valid (`need_container`), and
//! - for every `"<relationship>:<ci type>"` clause, the first incident link
//!   of that relationship whose other end has that CI type leads to a valid
//!   CI (`need_relationship`). A clause without such a link is unsatisfied.
//!
//! Validity is computed recursively and memoized. A CI reached again while
//! its own validity is still being decided is part of a dependency cycle and
//! counts as invalid, so every input terminates.

use crate::graph::{CiIndex, TopologyAccumulator};
use crate::mapping::{CiMapping, RelationshipRequirement};
use std::collections::BTreeSet;

/// The outcome of validation, in arena indices
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Validation {
    /// CIs without requirements
    pub standalone: BTreeSet<CiIndex>,
    /// CIs with requirements that were satisfied
    pub validated: BTreeSet<CiIndex>,
    /// CIs with requirements that were not satisfied
    pub discarded: BTreeSet<CiIndex>,
    /// Indices of built links whose ends both survived
    pub links: Vec<usize>,
}

impl Validation {
    /// Whether a CI is part of the final topology
    pub fn keeps(&self, ci: CiIndex) -> bool {
        self.standalone.contains(&ci) || self.validated.contains(&ci)
    }

    /// Surviving CIs in arena order
    pub fn kept_cis(&self) -> BTreeSet<CiIndex> {
        self.standalone.union(&self.validated).copied().collect()
    }
}

/// Computes a [`Validation`] over an accumulator's CIs and built links
pub struct DependencyValidator<'a> {
    acc: &'a TopologyAccumulator,
    ci_mappings: &'a [CiMapping],
    validated: BTreeSet<CiIndex>,
    discarded: BTreeSet<CiIndex>,
    in_progress: BTreeSet<CiIndex>,
}

impl<'a> DependencyValidator<'a> {
    pub fn new(acc: &'a TopologyAccumulator, ci_mappings: &'a [CiMapping]) -> Self {
        Self {
            acc,
            ci_mappings,
            validated: BTreeSet::new(),
            discarded: BTreeSet::new(),
            in_progress: BTreeSet::new(),
        }
    }

    /// Validate every CI with requirements and collect the surviving links
    pub fn run(mut self) -> Validation {
        let mut standalone = BTreeSet::new();
        let mut dependent = Vec::new();

        for (idx, slot) in self.acc.slots() {
            match self.ci_mappings.get(slot.mapping) {
                Some(mapping) if !mapping.is_standalone() => dependent.push(idx),
                _ => {
                    standalone.insert(idx);
                }
            }
        }

        for idx in dependent {
            self.add_all_dependencies(idx);
        }

        let mut validation = Validation {
            standalone,
            validated: self.validated,
            discarded: self.discarded,
            links: Vec::new(),
        };
        let links = self
            .acc
            .links()
            .iter()
            .enumerate()
            .filter(|(_, link)| validation.keeps(link.end1) && validation.keeps(link.end2))
            .map(|(i, _)| i)
            .collect();
        validation.links = links;

        tracing::debug!(
            standalone = validation.standalone.len(),
            validated = validation.validated.len(),
            discarded = validation.discarded.len(),
            links = validation.links.len(),
            "dependencies validated"
        );
        validation
    }

    /// Decide whether `ci` and everything it depends on is valid
    pub fn add_all_dependencies(&mut self, ci: CiIndex) -> bool {
        if self.validated.contains(&ci) {
            return true;
        }
        if self.discarded.contains(&ci) {
            return false;
        }
        if self.in_progress.contains(&ci) {
            tracing::warn!(ci = %self.describe(ci), "dependency cycle, treating CI as invalid");
            return false;
        }

        let (acc, ci_mappings) = (self.acc, self.ci_mappings);
        let Some(mapping) = acc.slot(ci).and_then(|slot| ci_mappings.get(slot.mapping)) else {
            // Removed from the arena, or built by an unknown mapping
            self.discarded.insert(ci);
            return false;
        };

        self.in_progress.insert(ci);
        let container_ok = !mapping.need_container || self.container_valid(ci);
        let relationship_ok = container_ok
            && mapping
                .need_relationship
                .iter()
                .all(|clause| self.clause_satisfied(ci, clause));
        self.in_progress.remove(&ci);

        if container_ok && relationship_ok {
            self.validated.insert(ci);
            true
        } else {
            tracing::debug!(
                ci = %self.describe(ci),
                container_ok,
                relationship_ok,
                "CI discarded"
            );
            self.discarded.insert(ci);
            false
        }
    }

    fn container_valid(&mut self, ci: CiIndex) -> bool {
        match self.acc.ci(ci).and_then(|target| target.container) {
            Some(container) => self.add_all_dependencies(container),
            None => false,
        }
    }

    /// First matching neighbor decides; there is no fallback to a second one
    fn clause_satisfied(&mut self, ci: CiIndex, clause: &RelationshipRequirement) -> bool {
        let acc = self.acc;
        let neighbor = acc
            .incident_links(ci)
            .iter()
            .filter_map(|&link_idx| acc.link(link_idx))
            .filter(|link| link.link_type == clause.relationship)
            .filter_map(|link| link.other_end(ci))
            .find(|&other| {
                acc.ci(other)
                    .map(|target| target.ci_type == clause.ci_type)
                    .unwrap_or(false)
            });

        match neighbor {
            Some(other) => self.add_all_dependencies(other),
            None => false,
        }
    }

    fn describe(&self, ci: CiIndex) -> String {
        self.acc
            .slot(ci)
            .map(|slot| slot.id.to_string())
            .unwrap_or_else(|| ci.to_string())
    }
}
