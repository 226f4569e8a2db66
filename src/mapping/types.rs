//! Compiled CI and link mapping rules
//!
//! These are the runtime forms consumed by the replication pipeline. The
//! serialized document form lives in `document.rs` and is compiled into
//! these types once, at load time.

use super::filters::{Filter, Validator};
use crate::coerce::AttributeKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors found while loading or compiling a mapping definition
#[derive(Debug, Error)]
pub enum MappingError {
    #[error("malformed relationship requirement '{0}': expected '<relationship>:<ci type>'")]
    MalformedRequirement(String),

    #[error("unknown filter: {0}")]
    UnknownFilter(String),

    #[error("unknown validator: {0}")]
    UnknownValidator(String),

    #[error("invalid argument for '{name}': {reason}")]
    InvalidArgument { name: String, reason: String },

    #[error("attribute mapping '{0}' must declare exactly one of field, value or template")]
    AmbiguousSource(String),

    #[error("CI mapping {index} is missing '{field}'")]
    MissingField { index: usize, field: &'static str },

    #[error("failed to read mapping file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse mapping document: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// What to do with the endpoints of a link whose other end is missing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Drop the link, keep both CIs
    #[default]
    None,
    ExcludeEnd1,
    ExcludeEnd2,
    ExcludeBoth,
}

impl FailurePolicy {
    pub fn excludes_end1(self) -> bool {
        matches!(self, Self::ExcludeEnd1 | Self::ExcludeBoth)
    }

    pub fn excludes_end2(self) -> bool {
        matches!(self, Self::ExcludeEnd2 | Self::ExcludeBoth)
    }
}

/// "This CI must be linked via `relationship` to a valid CI of `ci_type`"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipRequirement {
    pub relationship: String,
    pub ci_type: String,
}

impl RelationshipRequirement {
    pub fn new(relationship: impl Into<String>, ci_type: impl Into<String>) -> Self {
        Self {
            relationship: relationship.into(),
            ci_type: ci_type.into(),
        }
    }

    /// Parse a comma-separated list of `"<relationship>:<ci type>"` clauses.
    ///
    /// Blank input and empty clauses yield nothing; whitespace around
    /// clauses and their parts is ignored.
    pub fn parse_list(clauses: &str) -> Result<Vec<Self>, MappingError> {
        clauses
            .split(',')
            .map(str::trim)
            .filter(|clause| !clause.is_empty())
            .map(|clause| match clause.split_once(':') {
                Some((rel, ci_type)) if !rel.trim().is_empty() && !ci_type.trim().is_empty() => {
                    Ok(Self::new(rel.trim(), ci_type.trim()))
                }
                _ => Err(MappingError::MalformedRequirement(clause.to_string())),
            })
            .collect()
    }
}

impl std::fmt::Display for RelationshipRequirement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.relationship, self.ci_type)
    }
}

/// Where an attribute's raw value comes from
#[derive(Debug, Clone, PartialEq)]
pub enum ValueSource {
    /// A field of the source entity; `parent.<field>` reads the parent's field
    Field(String),
    /// A fixed value
    Constant(Value),
    /// String interpolation: `"{name} ({parent.name})"`
    Template(String),
}

/// Rule computing one CI attribute from a source entity
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeMapping {
    pub name: String,
    pub source: ValueSource,
    /// Pure transforms, applied in order
    pub filters: Vec<Filter>,
    /// Predicates checked after filtering
    pub validators: Vec<Validator>,
    /// Kind resolved from the catalog at load time, when available
    pub kind: Option<AttributeKind>,
}

impl AttributeMapping {
    pub fn new(name: impl Into<String>, source: ValueSource) -> Self {
        Self {
            name: name.into(),
            source,
            filters: Vec::new(),
            validators: Vec::new(),
            kind: None,
        }
    }

    /// Shorthand for a field-copy mapping
    pub fn field(name: impl Into<String>, field: impl Into<String>) -> Self {
        Self::new(name, ValueSource::Field(field.into()))
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validators.push(validator);
        self
    }

    pub fn with_kind(mut self, kind: AttributeKind) -> Self {
        self.kind = Some(kind);
        self
    }
}

/// Rule turning source entities of one type into CIs of one target type
#[derive(Debug, Clone, PartialEq)]
pub struct CiMapping {
    pub source_type: String,
    pub target_type: String,
    /// Raw field holding the entity's id
    pub id_key: String,
    pub attribute_mappings: Vec<AttributeMapping>,
    /// CI is only emitted if its container chain is valid
    pub need_container: bool,
    /// CI is only emitted if every clause is satisfied
    pub need_relationship: Vec<RelationshipRequirement>,
}

impl CiMapping {
    pub fn new(source_type: impl Into<String>, target_type: impl Into<String>) -> Self {
        Self {
            source_type: source_type.into(),
            target_type: target_type.into(),
            id_key: "id".to_string(),
            attribute_mappings: Vec::new(),
            need_container: false,
            need_relationship: Vec::new(),
        }
    }

    pub fn with_id_key(mut self, id_key: impl Into<String>) -> Self {
        self.id_key = id_key.into();
        self
    }

    pub fn with_attribute(mut self, mapping: AttributeMapping) -> Self {
        self.attribute_mappings.push(mapping);
        self
    }

    pub fn requiring_container(mut self) -> Self {
        self.need_container = true;
        self
    }

    pub fn requiring_relationship(
        mut self,
        relationship: impl Into<String>,
        ci_type: impl Into<String>,
    ) -> Self {
        self.need_relationship
            .push(RelationshipRequirement::new(relationship, ci_type));
        self
    }

    /// True if CIs of this mapping are included without validation
    pub fn is_standalone(&self) -> bool {
        !self.need_container && self.need_relationship.is_empty()
    }
}

/// Rule turning source cross-references into typed CI links
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkMapping {
    pub source_end1_type: String,
    pub source_end2_type: String,
    pub target_end1_type: String,
    pub target_end2_type: String,
    /// Link type to build (e.g., "composition", "usage")
    pub target_type: String,
    /// Swap end1 and end2 when building
    #[serde(default)]
    pub reverse: bool,
    /// Treat end1 as end2's container regardless of link type
    #[serde(default)]
    pub is_container: bool,
    #[serde(default)]
    pub failure_policy: FailurePolicy,
    /// Cross-reference strategy (`reference:<field>`, `back_reference:<field>`, `parent`)
    #[serde(default)]
    pub processor: String,
}

impl LinkMapping {
    pub fn new(
        source_end1_type: impl Into<String>,
        target_end1_type: impl Into<String>,
        source_end2_type: impl Into<String>,
        target_end2_type: impl Into<String>,
        target_type: impl Into<String>,
    ) -> Self {
        Self {
            source_end1_type: source_end1_type.into(),
            source_end2_type: source_end2_type.into(),
            target_end1_type: target_end1_type.into(),
            target_end2_type: target_end2_type.into(),
            target_type: target_type.into(),
            reverse: false,
            is_container: false,
            failure_policy: FailurePolicy::None,
            processor: String::new(),
        }
    }

    pub fn reversed(mut self) -> Self {
        self.reverse = true;
        self
    }

    pub fn as_container(mut self) -> Self {
        self.is_container = true;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn with_processor(mut self, processor: impl Into<String>) -> Self {
        self.processor = processor.into();
        self
    }

    /// Human-readable name used in logs and reports
    pub fn name(&self) -> String {
        format!(
            "{}({}) -[{}]-> {}({})",
            self.target_end1_type,
            self.source_end1_type,
            self.target_type,
            self.target_end2_type,
            self.source_end2_type
        )
    }
}

/// The full, ordered mapping definition for one replication
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mappings {
    pub ci_mappings: Vec<CiMapping>,
    pub link_mappings: Vec<LinkMapping>,
}

impl Mappings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ci(mut self, mapping: CiMapping) -> Self {
        self.ci_mappings.push(mapping);
        self
    }

    pub fn with_link(mut self, mapping: LinkMapping) -> Self {
        self.link_mappings.push(mapping);
        self
    }

    /// Id key of the first CI mapping reading `source_type`
    pub fn id_key_for(&self, source_type: &str) -> Option<&str> {
        self.ci_mappings
            .iter()
            .find(|mapping| mapping.source_type == source_type)
            .map(|mapping| mapping.id_key.as_str())
    }
}
