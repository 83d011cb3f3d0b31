//! Field-level cleanup helpers used by the character mapping.

use serde_json::Value;

/// Placeholder values the API uses for "no data".
const MISSING_MARKERS: [&str; 4] = ["", "unknown", "n/a", "none"];

/// Parses a number from a JSON number or a numeric string.
///
/// Strings are trimmed and thousands separators removed; missing markers and
/// unparseable text become `None`.
pub fn parse_numeric(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let trimmed = s.trim();
            if MISSING_MARKERS.contains(&trimmed.to_ascii_lowercase().as_str()) {
                return None;
            }
            trimmed.replace(',', "").parse::<f64>().ok()
        }
        _ => None,
    }
}

/// A trimmed, non-empty string, or `None`.
pub fn clean_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        _ => None,
    }
}

/// The non-blank strings of a JSON array; anything else is an empty list.
pub fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| clean_string(Some(item)))
            .collect(),
        _ => Vec::new(),
    }
}

pub fn boolean(value: Option<&Value>) -> Option<bool> {
    value.and_then(Value::as_bool)
}
