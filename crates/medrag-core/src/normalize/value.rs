//! Lenient accessors over untyped JSON.
//!
//! Every helper answers `None` instead of failing, so the normalizers built on
//! top of them can fall back to defaults field by field.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;

/// Current time in epoch milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Returns the first of `keys` present on `value` with a non-null value.
pub fn field<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    let object = value.as_object()?;
    keys.iter()
        .filter_map(|key| object.get(*key))
        .find(|v| !v.is_null())
}

/// Stringifies scalars. Objects, arrays and null yield `None`.
pub fn as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Like [`as_string`] but treats the empty string as absent.
pub fn non_empty_string(value: &Value) -> Option<String> {
    as_string(value).filter(|s| !s.trim().is_empty())
}

pub fn string_field(value: &Value, keys: &[&str]) -> Option<String> {
    field(value, keys).and_then(non_empty_string)
}

pub fn as_f64(value: &Value) -> Option<f64> {
    value.as_f64().filter(|f| f.is_finite())
}

/// Integers, integral floats and numeric strings.
pub fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn as_year(value: &Value) -> Option<i32> {
    as_i64(value).and_then(|y| i32::try_from(y).ok())
}

/// Collects the scalar elements of an array as strings.
pub fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(as_string).collect())
        .unwrap_or_default()
}

/// Parses an epoch-millisecond number or a date string.
pub fn parse_timestamp(value: &Value) -> Option<i64> {
    match value {
        Value::Number(_) => as_i64(value),
        Value::String(s) => parse_date_string(s.trim()),
        _ => None,
    }
}

fn parse_date_string(s: &str) -> Option<i64> {
    if s.is_empty() {
        return None;
    }
    if let Ok(millis) = s.parse::<i64>() {
        return Some(millis);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc().timestamp_millis());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().timestamp_millis())
}
