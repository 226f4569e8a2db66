//! cmdb-pull: mapping-driven CMDB topology replication
//!
//! Reads raw records from a source system and turns them into a
//! structurally consistent topology of typed configuration items (CIs) and
//! links, as declared by a set of mapping rules.
//!
//! # Core Concepts
//!
//! - **Source entities**: raw records, indexed by source type and id
//! - **CI mappings**: how one source type becomes one target CI type, and
//!   what a CI requires (a container, named relationships) to be kept
//! - **Link mappings**: how cross-references between source types become
//!   typed links, and what to do when one end is missing
//! - **Topology**: the CIs and links that survive dependency validation
//!
//! # Example
//!
//! ```
//! use cmdb_pull::{CiMapping, LinkMapping, Mappings};
//!
//! let mappings = Mappings::new()
//!     .with_ci(CiMapping::new("host", "node"))
//!     .with_ci(CiMapping::new("app", "running_software").requiring_container())
//!     .with_link(
//!         LinkMapping::new("host", "node", "app", "running_software", "composition")
//!             .with_processor("reference:apps"),
//!     );
//! assert_eq!(mappings.ci_mappings.len(), 2);
//! ```

pub mod coerce;
pub mod emit;
pub mod graph;
pub mod mapping;
pub mod materialize;
pub mod replicate;
pub mod resolve;
pub mod source;
pub mod validate;

pub use coerce::{AttributeCatalog, AttributeKind, CoercionError, StaticCatalog};
pub use emit::{FinalTopology, TopologyCi};
pub use graph::{
    AttributeValue, Attributes, BuiltLink, CiIndex, ComplexId, EnumValue, LinkOutcome,
    SourceLink, TargetCi, TopologyAccumulator, ROOT_CONTAINER,
};
pub use mapping::{
    load_mappings, AttributeMapping, CiMapping, FailurePolicy, Filter, LinkMapping, MappingError,
    Mappings, RelationshipRequirement, Validator, ValueSource,
};
pub use replicate::{Replication, ReplicationError, ReplicationReport, Replicator};
pub use source::{
    LinkProcessor, LinkProcessorError, MemorySourceSystem, SourceEntity, SourceEntityCache,
    SourceError, SourceSystem,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
