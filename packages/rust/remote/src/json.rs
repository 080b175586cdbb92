//! Tolerant JSON extraction from model output.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

/// Parse the JSON payload out of a chat completion.
///
/// Strips `<think>` blocks and a surrounding markdown fence, then tries the
/// whole text and finally the outermost `{...}` span. `None` when nothing parses.
pub fn parse_json(raw: &str) -> Option<Value> {
    static THINK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?s)<think>.*?</think>").expect("valid regex"));
    static FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?s)^\s*```[a-zA-Z0-9]*\s*(.*?)\s*```\s*$").expect("valid regex")
    });

    let without_think = THINK_RE.replace_all(raw, "");
    let mut text = without_think.trim();
    if let Some(caps) = FENCE_RE.captures(text) {
        if let Some(inner) = caps.get(1) {
            text = inner.as_str().trim();
        }
    }
    if text.is_empty() {
        return None;
    }

    if let Ok(value) = serde_json::from_str(text) {
        return Some(value);
    }

    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}

/// A JSON object payload; a top-level array yields its first object.
pub fn parse_object(raw: &str) -> Option<Value> {
    match parse_json(raw)? {
        Value::Object(map) => Some(Value::Object(map)),
        Value::Array(items) => items.into_iter().find(Value::is_object),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn plain_json() {
        assert_eq!(parse_json(r#"{"a": 1}"#), Some(json!({"a": 1})));
    }

    #[test]
    fn fenced_json() {
        let raw = "```json\n{\"upstream\": [\"硅料\"]}\n```";
        assert_eq!(parse_json(raw), Some(json!({"upstream": ["硅料"]})));
    }

    #[test]
    fn think_block_and_prose_around_object() {
        let raw = "<think>\nreasoning {not json}\n</think>\n结果如下：{\"score\": 0.8} 以上。";
        assert_eq!(parse_json(raw), Some(json!({"score": 0.8})));
    }

    #[test]
    fn unparseable_returns_none() {
        assert_eq!(parse_json("Invalid JSON"), None);
        assert_eq!(parse_json("   "), None);
        assert_eq!(parse_json("} backwards {"), None);
    }

    #[test]
    fn array_yields_first_object() {
        let raw = r#"[{"entity_name": "硅片"}, {"entity_name": "other"}]"#;
        assert_eq!(parse_object(raw), Some(json!({"entity_name": "硅片"})));
        assert_eq!(parse_object("[1, 2]"), None);
    }
}
