//! Mapping documents: the serialized form of a mapping definition
//!
//! ```yaml
//! cis:
//!   - source_type: host
//!     target_type: node
//!     id_key: name
//!     attributes:
//!       - { name: name, field: name, filters: [lowercase], validators: [not_empty] }
//!       - { name: os_family, value: unix }
//!   - source_type: app
//!     target_type: running_software
//!     need_container: true
//!     need_relationship: "usage:database"
//! links:
//!   - source_end1_type: host
//!     target_end1_type: node
//!     source_end2_type: app
//!     target_end2_type: running_software
//!     target_type: composition
//!     processor: "reference:apps"
//!     failure_policy: exclude_end2
//! ```
//!
//! JSON documents are accepted too, since JSON is valid YAML.

use super::filters::{Filter, Validator};
use super::types::{
    AttributeMapping, CiMapping, LinkMapping, MappingError, Mappings, RelationshipRequirement,
    ValueSource,
};
use crate::coerce::AttributeCatalog;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

fn default_id_key() -> String {
    "id".to_string()
}

/// One attribute rule as written in a document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributeDoc {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validators: Vec<String>,
}

/// One CI rule as written in a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CiMappingDoc {
    pub source_type: String,
    pub target_type: String,
    #[serde(default = "default_id_key")]
    pub id_key: String,
    #[serde(default)]
    pub attributes: Vec<AttributeDoc>,
    #[serde(default)]
    pub need_container: bool,
    /// Comma-separated `"<relationship>:<ci type>"` clauses
    #[serde(default)]
    pub need_relationship: String,
}

/// A complete mapping document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MappingDocument {
    #[serde(default)]
    pub cis: Vec<CiMappingDoc>,
    #[serde(default)]
    pub links: Vec<LinkMapping>,
}

impl MappingDocument {
    pub fn from_yaml_str(text: &str) -> Result<Self, MappingError> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, MappingError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// Compile into runtime mappings.
    ///
    /// Filter, validator and relationship syntax is checked here. When a
    /// catalog is given, attribute kinds are resolved up front; attributes
    /// the catalog cannot resolve are left to fail per CI during
    /// materialization.
    pub fn compile(self, catalog: Option<&dyn AttributeCatalog>) -> Result<Mappings, MappingError> {
        let ci_mappings = self
            .cis
            .into_iter()
            .enumerate()
            .map(|(index, doc)| compile_ci(index, doc, catalog))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Mappings {
            ci_mappings,
            link_mappings: self.links,
        })
    }
}

fn compile_ci(
    index: usize,
    doc: CiMappingDoc,
    catalog: Option<&dyn AttributeCatalog>,
) -> Result<CiMapping, MappingError> {
    if doc.source_type.trim().is_empty() {
        return Err(MappingError::MissingField { index, field: "source_type" });
    }
    if doc.target_type.trim().is_empty() {
        return Err(MappingError::MissingField { index, field: "target_type" });
    }

    let attribute_mappings = doc
        .attributes
        .into_iter()
        .map(|attr| compile_attribute(&doc.target_type, attr, catalog))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CiMapping {
        need_relationship: RelationshipRequirement::parse_list(&doc.need_relationship)?,
        source_type: doc.source_type,
        target_type: doc.target_type,
        id_key: doc.id_key,
        attribute_mappings,
        need_container: doc.need_container,
    })
}

fn compile_attribute(
    ci_type: &str,
    doc: AttributeDoc,
    catalog: Option<&dyn AttributeCatalog>,
) -> Result<AttributeMapping, MappingError> {
    let source = match (doc.field, doc.value, doc.template) {
        (Some(field), None, None) => ValueSource::Field(field),
        (None, Some(value), None) => ValueSource::Constant(value),
        (None, None, Some(template)) => ValueSource::Template(template),
        _ => return Err(MappingError::AmbiguousSource(doc.name)),
    };

    let mut mapping = AttributeMapping::new(doc.name, source);
    mapping.filters = doc
        .filters
        .iter()
        .map(|f| f.parse::<Filter>())
        .collect::<Result<_, _>>()?;
    mapping.validators = doc
        .validators
        .iter()
        .map(|v| v.parse::<Validator>())
        .collect::<Result<_, _>>()?;

    if let Some(catalog) = catalog {
        match catalog.attribute_kind(ci_type, &mapping.name) {
            Ok(kind) => mapping.kind = Some(kind),
            Err(e) => tracing::warn!(error = %e, "attribute kind unresolved at load time"),
        }
    }
    Ok(mapping)
}

/// Read and compile a mapping file
pub fn load_mappings(
    path: impl AsRef<Path>,
    catalog: Option<&dyn AttributeCatalog>,
) -> Result<Mappings, MappingError> {
    MappingDocument::from_path(path)?.compile(catalog)
}
