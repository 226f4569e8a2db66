//! Attribute filters and validators
//!
//! Filters are pure transforms over JSON values, applied in declaration
//! order. Validators are predicates checked after filtering; a failing
//! validator discards the whole CI.
//!
//! Both are written in mapping documents as `name` or `name:argument`,
//! e.g. `lowercase`, `default:unknown`, `replace:-=_`, `one_of:a|b|c`.

use super::types::MappingError;
use serde_json::Value;
use std::str::FromStr;

/// Split `"name:arg"` into its parts.
fn split_spec(spec: &str) -> (&str, Option<&str>) {
    match spec.split_once(':') {
        Some((name, arg)) => (name.trim(), Some(arg.trim())),
        None => (spec.trim(), None),
    }
}

fn require_arg<'a>(name: &str, arg: Option<&'a str>) -> Result<&'a str, MappingError> {
    arg.ok_or_else(|| MappingError::InvalidArgument {
        name: name.to_string(),
        reason: "missing argument".to_string(),
    })
}

fn parse_number<T: FromStr>(name: &str, arg: Option<&str>) -> Result<T, MappingError> {
    let raw = require_arg(name, arg)?;
    raw.parse().map_err(|_| MappingError::InvalidArgument {
        name: name.to_string(),
        reason: format!("'{}' is not a number", raw),
    })
}

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

/// A pure transform applied to an attribute's raw value
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Lowercase,
    Uppercase,
    Trim,
    /// Replace null or empty string with a fixed value
    Default(String),
    Prefix(String),
    Suffix(String),
    Replace { from: String, to: String },
    /// Split a string into an array
    Split(String),
    /// Join an array of strings into one string
    Join(String),
}

impl FromStr for Filter {
    type Err = MappingError;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let (name, arg) = split_spec(spec);
        match name {
            "lowercase" => Ok(Self::Lowercase),
            "uppercase" => Ok(Self::Uppercase),
            "trim" => Ok(Self::Trim),
            "default" => Ok(Self::Default(arg.unwrap_or("").to_string())),
            "prefix" => Ok(Self::Prefix(require_arg(name, arg)?.to_string())),
            "suffix" => Ok(Self::Suffix(require_arg(name, arg)?.to_string())),
            "replace" => {
                let raw = require_arg(name, arg)?;
                let (from, to) = raw.split_once('=').ok_or_else(|| MappingError::InvalidArgument {
                    name: name.to_string(),
                    reason: format!("expected '<from>=<to>', got '{}'", raw),
                })?;
                Ok(Self::Replace {
                    from: from.to_string(),
                    to: to.to_string(),
                })
            }
            "split" => match arg.unwrap_or(",") {
                "" => Err(MappingError::InvalidArgument {
                    name: name.to_string(),
                    reason: "separator must not be empty".to_string(),
                }),
                sep => Ok(Self::Split(sep.to_string())),
            },
            "join" => Ok(Self::Join(arg.unwrap_or(",").to_string())),
            _ => Err(MappingError::UnknownFilter(name.to_string())),
        }
    }
}

impl Filter {
    /// Apply the filter. Values of a kind the filter does not handle pass
    /// through unchanged.
    pub fn apply(&self, value: Value) -> Value {
        match (self, value) {
            (Self::Lowercase, Value::String(s)) => Value::String(s.to_lowercase()),
            (Self::Uppercase, Value::String(s)) => Value::String(s.to_uppercase()),
            (Self::Trim, Value::String(s)) => Value::String(s.trim().to_string()),
            (Self::Default(fallback), Value::Null) => Value::String(fallback.clone()),
            (Self::Default(fallback), Value::String(s)) if s.is_empty() => {
                Value::String(fallback.clone())
            }
            (Self::Prefix(prefix), Value::String(s)) => Value::String(format!("{}{}", prefix, s)),
            (Self::Suffix(suffix), Value::String(s)) => Value::String(format!("{}{}", s, suffix)),
            (Self::Replace { from, to }, Value::String(s)) => Value::String(s.replace(from, to)),
            (Self::Split(sep), Value::String(s)) => Value::Array(
                s.split(sep.as_str())
                    .map(str::trim)
                    .filter(|part| !part.is_empty())
                    .map(|part| Value::String(part.to_string()))
                    .collect(),
            ),
            (Self::Join(sep), Value::Array(items)) => {
                let parts: Vec<String> = items
                    .iter()
                    .filter_map(|v| match v {
                        Value::String(s) => Some(s.clone()),
                        Value::Number(n) => Some(n.to_string()),
                        _ => None,
                    })
                    .collect();
                Value::String(parts.join(sep))
            }
            (_, other) => other,
        }
    }
}

// ---------------------------------------------------------------------------
// Validators
// ---------------------------------------------------------------------------

/// A predicate over a filtered attribute value
#[derive(Debug, Clone, PartialEq)]
pub enum Validator {
    NotEmpty,
    /// Number, or a string that parses as one
    Numeric,
    OneOf(Vec<String>),
    MaxLength(usize),
    Min(f64),
    Max(f64),
}

impl FromStr for Validator {
    type Err = MappingError;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let (name, arg) = split_spec(spec);
        match name {
            "not_empty" => Ok(Self::NotEmpty),
            "numeric" => Ok(Self::Numeric),
            "one_of" => Ok(Self::OneOf(
                require_arg(name, arg)?
                    .split('|')
                    .map(|s| s.trim().to_string())
                    .collect(),
            )),
            "max_length" => Ok(Self::MaxLength(parse_number(name, arg)?)),
            "min" => Ok(Self::Min(parse_number(name, arg)?)),
            "max" => Ok(Self::Max(parse_number(name, arg)?)),
            _ => Err(MappingError::UnknownValidator(name.to_string())),
        }
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl Validator {
    /// Check a value, returning a description of the failure
    pub fn check(&self, value: &Value) -> Result<(), String> {
        match self {
            Self::NotEmpty => match value {
                Value::Null => Err("value is missing".to_string()),
                Value::String(s) if s.trim().is_empty() => Err("value is empty".to_string()),
                Value::Array(a) if a.is_empty() => Err("list is empty".to_string()),
                _ => Ok(()),
            },
            Self::Numeric => as_number(value)
                .map(|_| ())
                .ok_or_else(|| format!("{} is not numeric", value)),
            Self::OneOf(allowed) => {
                let rendered = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                if allowed.iter().any(|a| *a == rendered) {
                    Ok(())
                } else {
                    Err(format!("'{}' is not one of [{}]", rendered, allowed.join(", ")))
                }
            }
            Self::MaxLength(max) => match value {
                Value::String(s) if s.chars().count() > *max => {
                    Err(format!("length {} exceeds {}", s.chars().count(), max))
                }
                _ => Ok(()),
            },
            Self::Min(min) => match as_number(value) {
                Some(n) if n < *min => Err(format!("{} is below {}", n, min)),
                Some(_) => Ok(()),
                None => Err(format!("{} is not numeric", value)),
            },
            Self::Max(max) => match as_number(value) {
                Some(n) if n > *max => Err(format!("{} is above {}", n, max)),
                Some(_) => Ok(()),
                None => Err(format!("{} is not numeric", value)),
            },
        }
    }
}
