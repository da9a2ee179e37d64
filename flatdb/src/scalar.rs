//! Canonical string and numeric views of decoded scalar values.
//!
//! Identifiers and reference values are compared through their string form,
//! so every decoder-specific representation of the same scalar must reduce
//! to the same text.

use crate::value::Value;

/// 2^63 as an `f64`; the first value past the `i64` range.
const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;

/// Canonical string form of a scalar value.
///
/// Returns `None` for empty strings, non-finite floats, booleans, nulls and
/// collections.
pub fn as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Integer(i) => Some(i.to_string()),
        Value::Float(f) if f.is_finite() => Some(format_float(*f)),
        Value::Number(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

/// Shortest decimal form that round-trips, without a trailing `.0` for
/// integral values.
pub fn format_float(f: f64) -> String {
    format!("{f}")
}

/// Exact `i64` view of a value: integral and in range, or `None`.
pub fn to_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Integer(i) => Some(*i),
        Value::Float(f) => float_to_i64(*f),
        Value::Number(s) | Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(float_to_i64))
        }
        _ => None,
    }
}

fn float_to_i64(f: f64) -> Option<i64> {
    if f.is_finite() && f.fract() == 0.0 && (-I64_BOUND..I64_BOUND).contains(&f) {
        Some(f as i64)
    } else {
        None
    }
}

/// Finite `f64` view of a value.
pub fn to_f64(value: &Value) -> Option<f64> {
    let f = match value {
        Value::Integer(i) => *i as f64,
        Value::Float(f) => *f,
        Value::Number(s) | Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    f.is_finite().then_some(f)
}
