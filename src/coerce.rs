//! Type-directed attribute coercion
//!
//! Every CI attribute has a declared type in an external class-model
//! catalog. The catalog's type name is resolved once into an
//! [`AttributeKind`], and raw JSON values are converted into
//! [`AttributeValue`]s according to that kind.

use crate::graph::{AttributeValue, EnumValue, TargetCi};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

/// Errors raised while setting a CI attribute
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoercionError {
    #[error("unknown attribute '{attribute}' on CI type '{ci_type}'")]
    UnknownAttribute { ci_type: String, attribute: String },

    #[error("unsupported attribute type '{type_name}' for {ci_type}.{attribute}")]
    UnsupportedAttributeType {
        ci_type: String,
        attribute: String,
        type_name: String,
    },

    #[error("cannot convert {value} to {kind} for attribute '{attribute}'")]
    InvalidValue {
        attribute: String,
        kind: AttributeKind,
        value: String,
    },
}

/// The closed set of attribute kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeKind {
    String,
    Integer,
    Double,
    Boolean,
    Enum,
    StringList,
}

impl AttributeKind {
    /// Resolve a catalog type name. Any name ending in `enum` is an enum.
    pub fn from_type_name(type_name: &str) -> Option<Self> {
        match type_name {
            "string" => Some(Self::String),
            "integer" | "long" => Some(Self::Integer),
            "double" | "float" => Some(Self::Double),
            "boolean" => Some(Self::Boolean),
            "string_list" => Some(Self::StringList),
            name if name.ends_with("enum") => Some(Self::Enum),
            _ => None,
        }
    }
}

impl std::fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Double => "double",
            Self::Boolean => "boolean",
            Self::Enum => "enum",
            Self::StringList => "string_list",
        };
        f.write_str(name)
    }
}

/// Source of declared attribute types, keyed by CI type
pub trait AttributeCatalog: Send + Sync {
    /// Declared type name of `ci_type.attribute`
    fn attribute_type(&self, ci_type: &str, attribute: &str) -> Result<String, CoercionError>;

    /// Declared kind of `ci_type.attribute`
    fn attribute_kind(&self, ci_type: &str, attribute: &str) -> Result<AttributeKind, CoercionError> {
        let type_name = self.attribute_type(ci_type, attribute)?;
        AttributeKind::from_type_name(&type_name).ok_or_else(|| {
            CoercionError::UnsupportedAttributeType {
                ci_type: ci_type.to_string(),
                attribute: attribute.to_string(),
                type_name,
            }
        })
    }
}

/// Map-backed catalog: `ci_type -> attribute -> type name`.
///
/// Loads from YAML:
///
/// ```yaml
/// node:
///   name: string
///   cpu_count: integer
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StaticCatalog {
    types: BTreeMap<String, BTreeMap<String, String>>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_attribute(
        mut self,
        ci_type: impl Into<String>,
        attribute: impl Into<String>,
        type_name: impl Into<String>,
    ) -> Self {
        self.types
            .entry(ci_type.into())
            .or_default()
            .insert(attribute.into(), type_name.into());
        self
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, crate::mapping::MappingError> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::from_yaml_str(&text)?)
    }

    pub fn ci_type_count(&self) -> usize {
        self.types.len()
    }
}

impl AttributeCatalog for StaticCatalog {
    fn attribute_type(&self, ci_type: &str, attribute: &str) -> Result<String, CoercionError> {
        self.types
            .get(ci_type)
            .and_then(|attrs| attrs.get(attribute))
            .cloned()
            .ok_or_else(|| CoercionError::UnknownAttribute {
                ci_type: ci_type.to_string(),
                attribute: attribute.to_string(),
            })
    }
}

/// Whether a raw value counts as "no value" and is skipped
pub fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn to_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

fn to_double(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn to_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Convert a raw value into a typed attribute value of the given kind
pub fn coerce_value(
    kind: AttributeKind,
    attribute: &str,
    raw: &Value,
) -> Result<AttributeValue, CoercionError> {
    let converted = match kind {
        AttributeKind::String => scalar_to_string(raw).map(AttributeValue::String),
        AttributeKind::Integer => to_integer(raw).map(AttributeValue::Int),
        AttributeKind::Double => to_double(raw).map(AttributeValue::Double),
        AttributeKind::Boolean => to_bool(raw).map(AttributeValue::Bool),
        AttributeKind::Enum => match raw {
            Value::Number(_) => to_integer(raw).map(|c| AttributeValue::Enum(EnumValue::Code(c))),
            Value::String(s) => Some(AttributeValue::Enum(match s.trim().parse::<i64>() {
                Ok(code) => EnumValue::Code(code),
                Err(_) => EnumValue::Symbol(s.clone()),
            })),
            _ => None,
        },
        AttributeKind::StringList => match raw {
            Value::Array(items) => items
                .iter()
                .map(scalar_to_string)
                .collect::<Option<Vec<_>>>()
                .map(AttributeValue::StringList),
            other => scalar_to_string(other).map(|s| AttributeValue::StringList(vec![s])),
        },
    };

    converted.ok_or_else(|| CoercionError::InvalidValue {
        attribute: attribute.to_string(),
        kind,
        value: raw.to_string(),
    })
}

/// Set an attribute whose kind is already known.
///
/// Returns `Ok(false)` when the raw value is falsy and the attribute was
/// left unset.
pub fn set_attribute_of_kind(
    ci: &mut TargetCi,
    kind: AttributeKind,
    name: &str,
    raw: &Value,
) -> Result<bool, CoercionError> {
    if is_falsy(raw) {
        tracing::debug!(ci_type = %ci.ci_type, attribute = name, "skipping empty attribute value");
        return Ok(false);
    }
    let value = coerce_value(kind, name, raw)?;
    ci.set_attribute(name, value);
    Ok(true)
}

/// Look up the attribute's declared type and set it on the CI.
///
/// A failed lookup or an unsupported type is reported before the value is
/// inspected, so it aborts the CI even for empty values.
pub fn set_ci_attribute(
    ci: &mut TargetCi,
    catalog: &dyn AttributeCatalog,
    name: &str,
    raw: &Value,
) -> Result<bool, CoercionError> {
    let kind = catalog.attribute_kind(&ci.ci_type, name)?;
    set_attribute_of_kind(ci, kind, name, raw)
}
