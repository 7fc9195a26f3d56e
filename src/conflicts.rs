//! Human-readable summaries of keyword cannibalization payloads.
//!
//! A payload looks like `{"data": [{"pos": 5, "url": "https://x.com/a"}]}`.
//! Formatting is row-local: a payload that cannot be read yields
//! [`FORMAT_ERROR`] and never affects other rows.

use serde_json::Value;

/// Marker shown in place of a payload that could not be read
pub const FORMAT_ERROR: &str = "Format error";

const SEPARATOR: &str = " | ";

/// Summarise a raw payload, e.g. `Pos 5: x.com/a | Pos 9: x.com/b`
///
/// Returns an empty string when there is no payload or no competing items.
pub fn format_conflict_detail(raw: Option<&str>) -> String {
    let raw = match raw.map(str::trim) {
        None | Some("") => return String::new(),
        Some(raw) => raw,
    };

    match serde_json::from_str::<Value>(raw) {
        Ok(payload) => format_payload(&payload).unwrap_or_else(|| FORMAT_ERROR.to_string()),
        Err(_) => FORMAT_ERROR.to_string(),
    }
}

/// Summarise an already-decoded payload; `None` when its shape is invalid
pub fn format_payload(payload: &Value) -> Option<String> {
    let object = match payload {
        Value::Null => return Some(String::new()),
        // Payloads stored as JSON strings holding the encoded object
        Value::String(inner) => return Some(format_conflict_detail(Some(inner))),
        Value::Object(object) => object,
        _ => return None,
    };

    let items = match object.get("data") {
        None => return Some(String::new()),
        Some(data) if is_blank(data) => return Some(String::new()),
        Some(Value::Array(items)) => items,
        Some(_) => return None,
    };

    let mut conflicts = Vec::with_capacity(items.len());
    for item in items {
        let item = item.as_object()?;
        let url = match item.get("url") {
            None => String::new(),
            Some(Value::String(url)) => strip_scheme(url),
            Some(_) => return None,
        };
        let position = match item.get("pos") {
            None => "?".to_string(),
            Some(Value::Null) => "None".to_string(),
            Some(Value::String(pos)) => pos.clone(),
            Some(other) => other.to_string(),
        };
        conflicts.push(format!("Pos {}: {}", position, url));
    }

    Some(conflicts.join(SEPARATOR))
}

// Null, false, zero and empty containers carry no competing URLs
fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(flag) => !flag,
        Value::Number(number) => number.as_f64() == Some(0.0),
        Value::String(text) => text.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.is_empty(),
    }
}

fn strip_scheme(url: &str) -> String {
    url.replace("https://", "").replace("http://", "")
}
