//! Declarative CI and link mapping rules

mod document;
mod filters;
mod types;

pub use document::{load_mappings, AttributeDoc, CiMappingDoc, MappingDocument};
pub use filters::{Filter, Validator};
pub use types::{
    AttributeMapping, CiMapping, FailurePolicy, LinkMapping, MappingError, Mappings,
    RelationshipRequirement, ValueSource,
};
