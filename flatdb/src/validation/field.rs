use crate::scalar;
use crate::schema::{FieldDefinition, FieldKind};
use crate::value::Value;
use regex::Regex;
use std::collections::HashMap;

const EMAIL_PATTERN: &str =
    r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?)*$";
const URI_PATTERN: &str = r"^[A-Za-z][A-Za-z0-9+.\-]*://[^\s/?#]+(?:[/?#]\S*)?$";

/// Compiled regular expressions, keyed by source. Invalid patterns are cached as `None`.
#[derive(Debug, Default)]
pub(crate) struct PatternCache {
    compiled: HashMap<String, Option<Regex>>,
}

impl PatternCache {
    /// `None` when the pattern does not compile.
    pub fn is_match(&mut self, pattern: &str, text: &str) -> Option<bool> {
        self.compiled
            .entry(pattern.to_string())
            .or_insert_with(|| Regex::new(pattern).ok())
            .as_ref()
            .map(|re| re.is_match(text))
    }
}

/// Check one declared field of a record; returns error messages.
pub(crate) fn check_field(
    field: &FieldDefinition,
    value: Option<&Value>,
    path: &str,
    patterns: &mut PatternCache,
) -> Vec<String> {
    match value {
        None | Some(Value::Null) => {
            if field.required && field.default.is_none() {
                vec![format!("missing required field {path:?}")]
            } else {
                Vec::new()
            }
        }
        Some(Value::Sequence(items)) if field.repeated => items
            .iter()
            .enumerate()
            .flat_map(|(i, item)| check_value(field, item, &format!("{path}[{i}]"), patterns))
            .collect(),
        Some(_) if field.repeated => vec![format!("field {path:?} must be an array")],
        Some(value) => check_value(field, value, path, patterns),
    }
}

fn check_value(
    field: &FieldDefinition,
    value: &Value,
    path: &str,
    patterns: &mut PatternCache,
) -> Vec<String> {
    let must_be = |kind: &str| vec![format!("field {path:?} must be {kind}")];
    match &field.kind {
        FieldKind::String => match value {
            Value::String(s) => check_string(field, s, path, patterns),
            _ => must_be("string"),
        },
        FieldKind::Integer => {
            let numeric = matches!(value, Value::Integer(_) | Value::Float(_) | Value::Number(_));
            if numeric && scalar::to_i64(value).is_some() {
                Vec::new()
            } else {
                must_be("integer")
            }
        }
        FieldKind::Number => {
            let numeric = matches!(value, Value::Integer(_) | Value::Float(_) | Value::Number(_));
            if numeric && scalar::to_f64(value).is_some() {
                Vec::new()
            } else {
                must_be("number")
            }
        }
        FieldKind::Boolean => match value {
            Value::Bool(_) => Vec::new(),
            _ => must_be("boolean"),
        },
        FieldKind::Enum => match value {
            Value::String(s) if field.enum_values.is_empty() || field.enum_values.contains(s) => {
                check_string(field, s, path, patterns)
            }
            _ => vec![format!(
                "field {path:?} must be one of [{}]",
                field.enum_values.join(", ")
            )],
        },
        FieldKind::Object => match value {
            Value::Mapping(map) => field
                .properties
                .iter()
                .flat_map(|p| {
                    check_field(p, map.get(&p.name), &format!("{path}.{}", p.name), patterns)
                })
                .collect(),
            _ => must_be("object"),
        },
        FieldKind::Reference(target) => match scalar::as_string(value) {
            Some(_) => Vec::new(),
            None => must_be(&format!("a {target} identifier")),
        },
    }
}

fn check_string(
    field: &FieldDefinition,
    text: &str,
    path: &str,
    patterns: &mut PatternCache,
) -> Vec<String> {
    let mut errors = Vec::new();
    if let Some(pattern) = &field.pattern {
        match patterns.is_match(pattern, text) {
            Some(true) => {}
            Some(false) => errors.push(format!("field {path:?} must match pattern {pattern:?}")),
            None => errors.push(format!("field {path:?} has invalid pattern {pattern:?}")),
        }
    }
    if let Some(format) = &field.format {
        let known = match format.to_ascii_lowercase().as_str() {
            "email" => patterns.is_match(EMAIL_PATTERN, text),
            "uri" | "url" => patterns.is_match(URI_PATTERN, text),
            _ => None,
        };
        if known == Some(false) {
            errors.push(format!("field {path:?} must satisfy format {format:?}"));
        }
    }
    errors
}
