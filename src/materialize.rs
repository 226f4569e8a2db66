//! CI Materializer: one source entity + one CI mapping -> one target CI
//!
//! Each attribute mapping computes a raw value from the entity, runs it
//! through the mapping's filters and validators, and coerces it into a
//! typed attribute. Any failure skips the whole CI; materialization of the
//! remaining entities continues.

use crate::coerce::{set_attribute_of_kind, set_ci_attribute, AttributeCatalog, CoercionError};
use crate::graph::TargetCi;
use crate::mapping::{AttributeMapping, CiMapping, ValueSource};
use crate::source::SourceEntity;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Why a source entity produced no CI
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SkipReason {
    #[error("attribute '{attribute}' rejected: {reason}")]
    InvalidValue { attribute: String, reason: String },

    #[error(transparent)]
    Coercion(#[from] CoercionError),
}

/// CIs built for one mapping, plus the entities that were skipped
#[derive(Debug, Default)]
pub struct MaterializeOutcome {
    pub built: Vec<(TargetCi, Arc<SourceEntity>)>,
    pub skipped: Vec<(String, SkipReason)>,
}

/// Materialize every entity with `ci_mapping`
pub fn materialize(
    ci_mapping: &CiMapping,
    entities: &[Arc<SourceEntity>],
    catalog: &dyn AttributeCatalog,
) -> MaterializeOutcome {
    let mut outcome = MaterializeOutcome::default();
    for entity in entities {
        match materialize_one(ci_mapping, entity, catalog) {
            Ok(ci) => outcome.built.push((ci, entity.clone())),
            Err(reason) => {
                tracing::warn!(
                    ci_type = %ci_mapping.target_type,
                    source_type = %ci_mapping.source_type,
                    entity = entity.id(),
                    %reason,
                    "CI skipped"
                );
                outcome.skipped.push((entity.id().to_string(), reason));
            }
        }
    }
    outcome
}

/// Build the CI for a single entity
pub fn materialize_one(
    ci_mapping: &CiMapping,
    entity: &SourceEntity,
    catalog: &dyn AttributeCatalog,
) -> Result<TargetCi, SkipReason> {
    let mut ci = TargetCi::new(&ci_mapping.target_type);
    for mapping in &ci_mapping.attribute_mappings {
        let value = attribute_value(mapping, entity)?;
        match mapping.kind {
            Some(kind) => set_attribute_of_kind(&mut ci, kind, &mapping.name, &value)?,
            None => set_ci_attribute(&mut ci, catalog, &mapping.name, &value)?,
        };
    }
    Ok(ci)
}

/// Compute, filter and validate one attribute's raw value
fn attribute_value(mapping: &AttributeMapping, entity: &SourceEntity) -> Result<Value, SkipReason> {
    let raw = resolve_source(&mapping.source, entity);
    let value = mapping
        .filters
        .iter()
        .fold(raw, |value, filter| filter.apply(value));

    for validator in &mapping.validators {
        validator.check(&value).map_err(|reason| SkipReason::InvalidValue {
            attribute: mapping.name.clone(),
            reason,
        })?;
    }
    Ok(value)
}

fn resolve_source(source: &ValueSource, entity: &SourceEntity) -> Value {
    match source {
        ValueSource::Field(path) => resolve_path(path, entity).unwrap_or(Value::Null),
        ValueSource::Constant(value) => value.clone(),
        ValueSource::Template(template) => render_template(template, entity),
    }
}

/// Resolve `field`, `id`, `parent.field` or `parent.id` against an entity.
///
/// Dotted paths below the first segment walk into nested JSON objects.
fn resolve_path(path: &str, entity: &SourceEntity) -> Option<Value> {
    if let Some(rest) = path.strip_prefix("parent.") {
        return entity.parent().and_then(|parent| resolve_path(rest, parent));
    }
    if path == "id" && entity.field("id").is_none() {
        return Some(Value::String(entity.id().to_string()));
    }

    let mut segments = path.split('.');
    let mut current = entity.field(segments.next()?)?;
    for segment in segments {
        current = current.get(segment)?;
    }
    Some(current.clone())
}

/// Render a template, replacing `{path}` with values from the entity.
///
/// A template referring to a missing field renders to null, so the
/// attribute is left unset rather than filled with a partial string.
fn render_template(template: &str, entity: &SourceEntity) -> Value {
    let mut result = String::new();
    let mut chars = template.chars();

    while let Some(ch) = chars.next() {
        if ch != '{' {
            result.push(ch);
            continue;
        }
        let mut expr = String::new();
        loop {
            match chars.next() {
                Some('}') => break,
                Some(c) => expr.push(c),
                None => return Value::Null,
            }
        }
        match resolve_path(expr.trim(), entity) {
            Some(Value::String(s)) => result.push_str(&s),
            Some(Value::Null) | None => return Value::Null,
            Some(other) => result.push_str(&other.to_string()),
        }
    }

    Value::String(result)
}
