//! Structured output extraction.
//!
//! Models asked for JSON frequently wrap it in a markdown fence or add
//! chatter around it. `extract_json` recovers the value when it can and
//! otherwise hands back a `{"raw": text}` sentinel. It never fails.

use serde_json::Value;

/// Key of the sentinel object returned when no JSON could be extracted.
pub const RAW_KEY: &str = "raw";

const JSON_FENCE: &str = "```json";
const FENCE: &str = "```";

/// Extract a JSON value from a provider response.
///
/// Order of precedence:
/// 1. the slice between a ```` ```json ```` fence and the next closing fence
/// 2. the whole text
/// 3. `{"raw": response_text}`
pub fn extract_json(response_text: &str) -> Value {
    if let Some(fenced) = fenced_slice(response_text) {
        match serde_json::from_str(fenced) {
            Ok(value) => return value,
            Err(e) => tracing::trace!(error = %e, "Fenced block is not valid JSON"),
        }
    }

    match serde_json::from_str(response_text.trim()) {
        Ok(value) => value,
        Err(_) => raw_sentinel(response_text),
    }
}

/// The trimmed contents of the first JSON-labelled fence, if any.
fn fenced_slice(text: &str) -> Option<&str> {
    let start = text.find(JSON_FENCE)? + JSON_FENCE.len();
    let rest = &text[start..];
    let body = match rest.find(FENCE) {
        Some(end) => &rest[..end],
        None => rest,
    };
    Some(body.trim())
}

/// Build the parse-failure sentinel.
pub fn raw_sentinel(text: &str) -> Value {
    let mut map = serde_json::Map::new();
    map.insert(RAW_KEY.into(), Value::String(text.to_string()));
    Value::Object(map)
}

/// If `value` is the parse-failure sentinel, return the raw text.
pub fn raw_text(value: &Value) -> Option<&str> {
    let obj = value.as_object()?;
    if obj.len() != 1 {
        return None;
    }
    obj.get(RAW_KEY)?.as_str()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fenced_json_is_extracted() {
        let text = "Here you go:\n```json\n{\"a\": 1}\n```\nHope that helps!";
        assert_eq!(extract_json(text), json!({"a": 1}));
    }

    #[test]
    fn only_fenced_slice_is_parsed() {
        // Trailing garbage after the closing fence must not poison the parse.
        let text = "```json\n{\"problem_type\": \"math\"}\n```\n}}} not json {{{";
        assert_eq!(extract_json(text), json!({"problem_type": "math"}));
    }

    #[test]
    fn bare_json_is_parsed() {
        assert_eq!(extract_json("  {\"x\": [1, 2]}  "), json!({"x": [1, 2]}));
        assert_eq!(extract_json("42"), json!(42));
    }

    #[test]
    fn garbage_returns_sentinel() {
        let value = extract_json("not json at all");
        assert_eq!(value, json!({"raw": "not json at all"}));
        assert_eq!(raw_text(&value), Some("not json at all"));
    }

    #[test]
    fn unterminated_fence_uses_rest_of_text() {
        let text = "```json\n{\"ok\": true}\n";
        assert_eq!(extract_json(text), json!({"ok": true}));
    }

    #[test]
    fn broken_fence_falls_through_to_sentinel() {
        let text = "```json\n{broken\n```";
        assert_eq!(raw_text(&extract_json(text)), Some(text));
    }

    #[test]
    fn sentinel_detection_is_strict() {
        assert!(raw_text(&json!({"raw": "x", "other": 1})).is_none());
        assert!(raw_text(&json!({"raw": 5})).is_none());
        assert!(raw_text(&json!("raw")).is_none());
    }

    #[test]
    fn empty_text_is_sentinel() {
        assert_eq!(extract_json(""), json!({"raw": ""}));
    }
}
