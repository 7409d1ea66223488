//! Lenient readers for loosely typed JSON fields.

use serde_json::{Map, Value};

/// Read a strictly positive integer.
///
/// Accepts JSON integers, floats (truncated toward zero) and strings holding a
/// decimal integer. Zero, negatives, overflow and everything else yield `None`.
pub fn positive_int(value: Option<&Value>) -> Option<u32> {
    let raw = match value? {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_u64().map(|v| i64::try_from(v).unwrap_or(i64::MAX)))
            .or_else(|| n.as_f64().map(|v| v.trunc() as i64))?,
        Value::String(s) => s.trim().parse::<i64>().ok()?,
        _ => return None,
    };
    u32::try_from(raw).ok().filter(|v| *v > 0)
}

/// Read a string with surrounding whitespace removed; blank strings are `None`.
pub fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Read a non-blank string as given, surrounding whitespace included.
pub fn non_blank_str(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

/// Read a string that must match exactly; only `""` counts as missing.
pub fn exact_str(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// Read an object field, treating anything else as absent.
pub fn object(value: Option<&Value>) -> Option<&Map<String, Value>> {
    value.and_then(Value::as_object)
}

/// Read a list of non-blank strings; non-string items are skipped.
pub fn string_list(value: Option<&Value>) -> Option<Vec<String>> {
    let items = value?.as_array()?;
    Some(
        items
            .iter()
            .filter_map(|item| non_empty_str(Some(item)))
            .map(str::to_string)
            .collect(),
    )
}
