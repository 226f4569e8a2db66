//! Target configuration items and their typed attribute values

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Attribute that mirrors a CI's container reference.
pub const ROOT_CONTAINER: &str = "root_container";

/// Position of a CI inside the accumulator's arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CiIndex(usize);

impl CiIndex {
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for CiIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Composite identity of a materialized CI.
///
/// Combines the source entity id, the source type and the target CI type so
/// that one source entity can feed several target types, and several source
/// types can feed the same target type, without key collisions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComplexId(String);

impl ComplexId {
    /// `"<target_type>: <source_id>_<source_type>"`, or
    /// `"<source_id>_<source_type>"` when the target type is empty.
    pub fn new(source_id: &str, source_type: &str, target_type: &str) -> Self {
        if target_type.is_empty() {
            Self(format!("{}_{}", source_id, source_type))
        } else {
            Self(format!("{}: {}_{}", target_type, source_id, source_type))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ComplexId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Value of an enum-typed attribute: a numeric code or a symbolic name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnumValue {
    Code(i64),
    Symbol(String),
}

/// Typed attribute values, one variant per attribute kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    String(String),
    Int(i64),
    Double(f64),
    Bool(bool),
    Enum(EnumValue),
    StringList(Vec<String>),
}

impl AttributeValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            Self::Enum(EnumValue::Symbol(s)) => Some(s),
            _ => None,
        }
    }
}

/// Attributes collection, ordered by name for stable output
pub type Attributes = BTreeMap<String, AttributeValue>;

/// A configuration item built from one source entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetCi {
    /// Target CI type (e.g., "node", "running_software")
    pub ci_type: String,
    /// Typed attributes
    pub attributes: Attributes,
    /// Containing CI, set by composition links
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<CiIndex>,
}

impl TargetCi {
    pub fn new(ci_type: impl Into<String>) -> Self {
        Self {
            ci_type: ci_type.into(),
            attributes: BTreeMap::new(),
            container: None,
        }
    }

    /// Add an attribute to the CI
    pub fn with_attribute(mut self, name: impl Into<String>, value: AttributeValue) -> Self {
        self.attributes.insert(name.into(), value);
        self
    }

    pub fn set_attribute(&mut self, name: impl Into<String>, value: AttributeValue) {
        self.attributes.insert(name.into(), value);
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }

    /// Point this CI at its container, mirroring the container's identity
    /// into the `root_container` attribute.
    pub fn set_container(&mut self, container: CiIndex, container_id: &ComplexId) {
        self.container = Some(container);
        self.attributes.insert(
            ROOT_CONTAINER.to_string(),
            AttributeValue::String(container_id.to_string()),
        );
    }
}
