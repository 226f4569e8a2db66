//! Source system boundary
//!
//! Raw records enter the pipeline here: a [`SourceSystem`] produces
//! [`SourceEntity`] values, which are indexed in a [`SourceEntityCache`]
//! and cross-referenced by [`LinkProcessor`]s.

mod cache;
mod entity;
mod memory;
mod processor;
mod traits;

pub use cache::{EntitiesById, SourceEntityCache};
pub use entity::SourceEntity;
pub use memory::MemorySourceSystem;
pub use processor::{BuiltinProcessor, LinkStrategy};
pub use traits::{LinkProcessor, LinkProcessorError, SourceError, SourceSystem};
