//! Core topology data structures

mod accumulator;
mod ci;
mod link;


pub use accumulator::{CiSlot, LinkOutcome, TopologyAccumulator};
pub use ci::{AttributeValue, Attributes, CiIndex, ComplexId, EnumValue, TargetCi, ROOT_CONTAINER};
pub use link::{is_composition_type, BuiltLink, PendingLink, SourceLink};
