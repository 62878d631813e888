//! Response decoding: recover JSON from free-form model output.
//!
//! Models asked for JSON still wrap it in prose or code fences now and then.
//! [`decode_response`] tries four strategies in a fixed order and returns
//! the first value it can recover:
//!
//! 1. fenced code blocks (```` ```json ... ``` ````), each in turn
//! 2. the whole text as JSON
//! 3. the span from the first `{` to the last `}`
//! 4. with a target field only: a regex for `"field": "value"`, then for
//!    `"field": 12.5`
//!
//! When a target field is requested, a strategy that parses JSON but finds
//! no such field counts as a miss and the next strategy runs.

use crate::error::ExtractionError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, error, warn};

/// A single decoding strategy.
pub type Strategy = fn(&str, Option<&str>) -> Option<Value>;

/// The strategies in the order they are tried.
pub const STRATEGIES: [(&str, Strategy); 4] = [
    ("code block", from_code_blocks),
    ("whole text", from_whole_text),
    ("brace span", from_brace_span),
    ("field regex", from_field_regex),
];

/// Number of characters of the response kept in an [`ExtractionError`].
const PREVIEW_CHARS: usize = 100;

/// Recover a JSON value from `response_text`.
///
/// Without `target_field` the parsed document is returned; with it, the
/// value stored under that key.
pub fn decode_response(
    response_text: &str,
    target_field: Option<&str>,
) -> Result<Value, ExtractionError> {
    for (name, strategy) in STRATEGIES {
        if let Some(value) = strategy(response_text, target_field) {
            debug!("Decoded response via {} strategy", name);
            return Ok(value);
        }
        debug!("{} strategy found nothing", name);
    }

    let preview: String = response_text.chars().take(PREVIEW_CHARS).collect();
    error!("Every JSON decoding strategy failed");
    warn!("Raw response: {}...", preview);
    Err(ExtractionError {
        preview,
        target_field: target_field.map(str::to_string),
    })
}

/// `parsed[field]` when a field is requested, else the whole value.
fn select(parsed: Value, target_field: Option<&str>) -> Option<Value> {
    match target_field {
        Some(field) => parsed.get(field).cloned(),
        None => Some(parsed),
    }
}

// ── Strategy 1: fenced code blocks ───────────────────────────────────────

static RE_CODE_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```(?:json)?\s*([\s\S]*?)```").unwrap());

pub fn from_code_blocks(text: &str, target_field: Option<&str>) -> Option<Value> {
    RE_CODE_BLOCK.captures_iter(text).find_map(|caps| {
        let parsed: Value = serde_json::from_str(caps[1].trim()).ok()?;
        select(parsed, target_field)
    })
}

// ── Strategy 2: whole response ───────────────────────────────────────────

pub fn from_whole_text(text: &str, target_field: Option<&str>) -> Option<Value> {
    let parsed: Value = serde_json::from_str(text).ok()?;
    select(parsed, target_field)
}

// ── Strategy 3: first `{` to last `}` ────────────────────────────────────

static RE_BRACE_SPAN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{[\s\S]*\}").unwrap());

pub fn from_brace_span(text: &str, target_field: Option<&str>) -> Option<Value> {
    let span = RE_BRACE_SPAN.find(text)?;
    let parsed: Value = serde_json::from_str(span.as_str()).ok()?;
    select(parsed, target_field)
}

// ── Strategy 4: field regex ──────────────────────────────────────────────

pub fn from_field_regex(text: &str, target_field: Option<&str>) -> Option<Value> {
    let field = regex::escape(target_field?);

    let quoted = Regex::new(&format!(r#""{field}"\s*:\s*"([^"]*)""#)).ok()?;
    if let Some(caps) = quoted.captures(text) {
        return Some(Value::String(caps[1].to_string()));
    }

    let numeric = Regex::new(&format!(r#""{field}"\s*:\s*([0-9.]+)"#)).ok()?;
    let caps = numeric.captures(text)?;
    Some(coerce_number(&caps[1]))
}

/// Float when the literal has a decimal point, else integer; a literal that
/// is neither (e.g. `1.2.3`) is kept as a string.
fn coerce_number(literal: &str) -> Value {
    let parsed = if literal.contains('.') {
        literal
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
    } else {
        literal
            .parse::<u64>()
            .ok()
            .map(|n| Value::Number(n.into()))
    };
    parsed.unwrap_or_else(|| Value::String(literal.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fenced_json_block() {
        let text = "prefix ```json\n{\"a\":1}\n``` suffix";
        assert_eq!(decode_response(text, None).unwrap(), json!({"a": 1}));
    }

    #[test]
    fn fence_without_language_tag() {
        let text = "here:\n```\n{\"a\": [1, 2]}\n```";
        assert_eq!(decode_response(text, None).unwrap(), json!({"a": [1, 2]}));
    }

    #[test]
    fn later_block_used_when_first_is_not_json() {
        let text = "```json\nnot json\n```\nand\n```json\n{\"b\": true}\n```";
        assert_eq!(from_code_blocks(text, None), Some(json!({"b": true})));
    }

    #[test]
    fn whole_text() {
        assert_eq!(decode_response(r#"{"a": 1}"#, None).unwrap(), json!({"a": 1}));
    }

    #[test]
    fn brace_span_in_prose() {
        let text = r#"noise {"a": 1} noise"#;
        assert_eq!(decode_response(text, None).unwrap(), json!({"a": 1}));
        assert_eq!(from_whole_text(text, None), None);
    }

    #[test]
    fn brace_span_is_greedy() {
        let text = r#"x {"a": {"b": 2}} y"#;
        assert_eq!(from_brace_span(text, None), Some(json!({"a": {"b": 2}})));
    }

    #[test]
    fn field_regex_string() {
        assert_eq!(
            decode_response(r#""a": "hello""#, Some("a")).unwrap(),
            json!("hello")
        );
    }

    #[test]
    fn field_regex_numbers() {
        assert_eq!(from_field_regex(r#"{"n": 42,"#, Some("n")), Some(json!(42)));
        assert_eq!(from_field_regex(r#""r": 0.25 ..."#, Some("r")), Some(json!(0.25)));
        assert_eq!(from_field_regex(r#""v": 1.2.3"#, Some("v")), Some(json!("1.2.3")));
    }

    #[test]
    fn field_regex_needs_target() {
        assert_eq!(from_field_regex(r#""a": "hello""#, None), None);
    }

    #[test]
    fn field_name_is_escaped() {
        assert_eq!(from_field_regex(r#""a.b": "x""#, Some("a.b")), Some(json!("x")));
        assert_eq!(from_field_regex(r#""aXb": "x""#, Some("a.b")), None);
    }

    #[test]
    fn target_field_selected() {
        let text = r#"{"titles": {"0": "合并损益表"}}"#;
        assert_eq!(
            decode_response(text, Some("titles")).unwrap(),
            json!({"0": "合并损益表"})
        );
    }

    #[test]
    fn missing_field_falls_through_to_next_strategy() {
        // The fenced block parses but lacks `summary`; the field regex finds it.
        let text = "```json\n{\"other\": 1}\n```\n{\"summary\": \"ok\"}";
        assert_eq!(from_code_blocks(text, Some("summary")), None);
        assert_eq!(decode_response(text, Some("summary")).unwrap(), json!("ok"));
    }

    #[test]
    fn missing_field_reaches_regex() {
        let text = r#"{"other": 1} and later "summary": "partial"#;
        assert_eq!(
            decode_response(text, Some("summary")).unwrap_err().target_field,
            Some("summary".into())
        );
        let text = r#"{"other": 1} and later "summary": "done""#;
        assert_eq!(decode_response(text, Some("summary")).unwrap(), json!("done"));
    }

    #[test]
    fn non_json_fails_with_preview() {
        let text = "抱歉，我无法处理这个请求。".repeat(20);
        let err = decode_response(&text, None).unwrap_err();
        assert_eq!(err.preview.chars().count(), 100);
        assert!(err.target_field.is_none());
    }

    #[test]
    fn empty_text_fails() {
        assert!(decode_response("", None).is_err());
        assert!(decode_response("", Some("titles")).is_err());
    }

    #[test]
    fn array_response_without_field() {
        assert_eq!(decode_response("[1, 2]", None).unwrap(), json!([1, 2]));
        assert!(from_whole_text("[1, 2]", Some("a")).is_none());
    }
}
