//! Links between configuration items

use super::ci::{CiIndex, ComplexId};
use serde::{Deserialize, Serialize};

/// Link types whose end1 contains end2.
const COMPOSITION_TYPES: &[&str] = &["composition", "containment"];

/// Whether a link type implies containment of end2 by end1
pub fn is_composition_type(link_type: &str) -> bool {
    COMPOSITION_TYPES.contains(&link_type)
}

/// A cross-reference fact reported by a source system, in source ids
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceLink {
    pub end1_id: String,
    pub end2_id: String,
}

impl SourceLink {
    pub fn new(end1_id: impl Into<String>, end2_id: impl Into<String>) -> Self {
        Self {
            end1_id: end1_id.into(),
            end2_id: end2_id.into(),
        }
    }
}

/// A link whose endpoints were both present when it was recorded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingLink {
    /// Index of the link mapping that produced it
    pub mapping: usize,
    pub source_link: SourceLink,
    pub end1: ComplexId,
    pub end2: ComplexId,
}

/// A typed, directed CI-to-CI link
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BuiltLink {
    /// Type of relationship (e.g., "composition", "dependency", "usage")
    pub link_type: String,
    pub end1: CiIndex,
    pub end2: CiIndex,
}

impl BuiltLink {
    pub fn new(link_type: impl Into<String>, end1: CiIndex, end2: CiIndex) -> Self {
        Self {
            link_type: link_type.into(),
            end1,
            end2,
        }
    }

    /// Whether the link has `ci` as one of its ends
    pub fn touches(&self, ci: CiIndex) -> bool {
        self.end1 == ci || self.end2 == ci
    }

    /// The end opposite to `ci`, if `ci` is an end of this link
    pub fn other_end(&self, ci: CiIndex) -> Option<CiIndex> {
        if self.end1 == ci {
            Some(self.end2)
        } else if self.end2 == ci {
            Some(self.end1)
        } else {
            None
        }
    }
}
