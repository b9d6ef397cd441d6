use serde_json::Value;
use trailmark_core::domain::Properties;

/// Cuts `text` to at most `max` characters
pub(crate) fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Unwraps a `json!({...})` literal into a property map
pub(crate) fn props(value: Value) -> Properties {
    match value {
        Value::Object(map) => map,
        _ => Properties::new(),
    }
}
