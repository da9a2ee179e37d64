//! Identifier extraction and coercion.
//!
//! Every identifier has two forms: the canonical string used for lookups and
//! the typed value written back to disk.

use crate::error::{FlatDbError, Result};
use crate::scalar;
use crate::schema::{FieldDefinition, FieldKind, TypeDefinition};
use crate::value::{Map, Value};

/// Canonical string form of a record's identifier.
pub(crate) fn lookup_key(definition: &TypeDefinition, record: &Map) -> Result<String> {
    let field = &definition.identifier.field;
    record
        .get(field)
        .and_then(scalar::as_string)
        .ok_or_else(|| {
            FlatDbError::Identifier(format!(
                "{}: identifier field {field:?} must be a non-empty string or number",
                definition.name
            ))
        })
}

/// Typed value stored for an identifier, per the identifier field's kind.
pub(crate) fn coerce(definition: &TypeDefinition, key: &str, raw: &Value) -> Result<Value> {
    let invalid = |expected: &str| {
        FlatDbError::Identifier(format!(
            "{}: identifier {key:?} is not a valid {expected}",
            definition.name
        ))
    };
    match definition.identifier_field().map(|f| &f.kind) {
        Some(FieldKind::Integer) => scalar::to_i64(raw)
            .map(Value::Integer)
            .ok_or_else(|| invalid("64-bit integer")),
        Some(FieldKind::Number) => scalar::to_f64(raw)
            .map(Value::Float)
            .ok_or_else(|| invalid("finite number")),
        Some(FieldKind::String | FieldKind::Enum) => scalar::as_string(raw)
            .map(Value::String)
            .ok_or_else(|| invalid("string")),
        _ => Ok(raw.clone()),
    }
}

pub(crate) fn check_pattern(definition: &TypeDefinition, key: &str) -> Result<()> {
    match &definition.identifier.pattern {
        Some(pattern) if !pattern.is_match(key) => Err(FlatDbError::Identifier(format!(
            "{}: identifier {key:?} does not match pattern {:?}",
            definition.name,
            pattern.as_str()
        ))),
        _ => Ok(()),
    }
}

/// Turn integral floats in `integer` fields into integers, recursing into objects.
pub(crate) fn normalize_integers(fields: &[FieldDefinition], record: &mut Map) {
    for field in fields {
        let Some(value) = record.get_mut(&field.name) else {
            continue;
        };
        match value {
            Value::Sequence(items) if field.repeated => {
                items.iter_mut().for_each(|item| normalize_value(field, item));
            }
            other => normalize_value(field, other),
        }
    }
}

fn normalize_value(field: &FieldDefinition, value: &mut Value) {
    match field.kind {
        FieldKind::Integer if matches!(value, Value::Float(_) | Value::Number(_)) => {
            if let Some(i) = scalar::to_i64(value) {
                *value = Value::Integer(i);
            }
        }
        FieldKind::Object => {
            if let Value::Mapping(map) = value {
                normalize_integers(&field.properties, map);
            }
        }
        _ => {}
    }
}
