//! Lenient parsing of tool intents from plain assistant text.
//!
//! Some backends answer a tool-eliciting prompt with a JSON object in the
//! message body instead of structured tool calls. The JSON is frequently
//! sloppy: Python literals, trailing commas, single quotes, prose around the
//! object. This module repairs what it can and extracts a tool call from it.

use regex::Regex;
use serde_json::Value;

use crate::protocol::ToolCall;

/// Id assigned to a call recovered from plain text (there is no native id).
const FALLBACK_CALL_ID: &str = "tool_0";

/// Try to interpret assistant text as a single tool intent of the form
/// `{"name": ..., "arguments": {...}}`. Returns `None` when the text does
/// not parse or lacks either field.
pub fn parse_tool_intent(content: &str) -> Option<ToolCall> {
    let value = parse_json_lenient(content.trim())?;
    let name = value.get("name")?.as_str()?.to_string();
    let arguments = value.get("arguments")?;
    Some(ToolCall {
        id: FALLBACK_CALL_ID.to_string(),
        name,
        arguments: serde_json::to_string(arguments).ok()?,
    })
}

/// Repair common JSON defects in model output: BOM, comments, Python
/// booleans/None, trailing commas, literal newlines inside strings.
pub fn repair_malformed_json(raw: &str) -> String {
    let mut result = raw
        .trim_start_matches('\u{feff}')
        .trim_start_matches('\u{fffe}')
        .to_string();

    // Line comments only when they start a line, to avoid eating "://"
    if let Ok(re) = Regex::new(r"(?m)^\s*//.*$") {
        result = re.replace_all(&result, "").to_string();
    }
    if let Ok(re) = Regex::new(r"(?s)/\*.*?\*/") {
        result = re.replace_all(&result, "").to_string();
    }

    if let Ok(re) = Regex::new(r"\bTrue\b") {
        result = re.replace_all(&result, "true").to_string();
    }
    if let Ok(re) = Regex::new(r"\bFalse\b") {
        result = re.replace_all(&result, "false").to_string();
    }
    if let Ok(re) = Regex::new(r"\bNone\b") {
        result = re.replace_all(&result, "null").to_string();
    }

    if let Ok(re) = Regex::new(r",(\s*[}\]])") {
        result = re.replace_all(&result, "$1").to_string();
    }

    // Literal newlines inside string values become \n
    if let Ok(re) = Regex::new(r#"("(?:[^"\\]|\\.)*)\n((?:[^"\\]|\\.)*")"#) {
        for _ in 0..5 {
            let next = re.replace_all(&result, "$1\\n$2").to_string();
            if next == result {
                break;
            }
            result = next;
        }
    }

    result
}

/// Parse JSON with lenient fallbacks, in order:
/// 1. direct serde_json parse
/// 2. `repair_malformed_json` + serde_json
/// 3. single-quote to double-quote swap + serde_json
/// 4. json5 (unquoted keys, comments)
/// 5. balanced-brace extraction from surrounding prose, then retry
pub fn parse_json_lenient(raw: &str) -> Option<Value> {
    if let Ok(val) = serde_json::from_str::<Value>(raw) {
        return Some(unwrap_intent(val));
    }

    let fixed = repair_malformed_json(raw);
    if let Ok(val) = serde_json::from_str::<Value>(&fixed) {
        return Some(unwrap_intent(val));
    }

    let requoted = fixed.replace('\'', "\"");
    if let Ok(val) = serde_json::from_str::<Value>(&requoted) {
        return Some(unwrap_intent(val));
    }

    if let Ok(val) = json5::from_str::<Value>(&fixed) {
        return Some(unwrap_intent(val));
    }

    if let Some(start) = raw.find('{') {
        if let Some(balanced) = extract_balanced_braces(&raw[start..]) {
            if balanced != raw {
                let fixed = repair_malformed_json(&balanced);
                if let Ok(val) = serde_json::from_str::<Value>(&fixed) {
                    return Some(unwrap_intent(val));
                }
                if let Ok(val) = json5::from_str::<Value>(&fixed) {
                    return Some(unwrap_intent(val));
                }
            }
        }
    }

    None
}

/// Unwrap structural wrappers models put around the actual intent:
/// single-element arrays and keys like `tool_call` or `function_call`.
fn unwrap_intent(value: Value) -> Value {
    if let Value::Array(arr) = &value {
        if arr.len() == 1 {
            return unwrap_intent(arr[0].clone());
        }
    }

    if let Value::Object(map) = &value {
        for key in ["tool_call", "function_call", "call", "tool", "function"] {
            if let Some(inner) = map.get(key) {
                if inner.get("name").is_some() {
                    return unwrap_intent(inner.clone());
                }
            }
        }
    }

    value
}

/// Extract a balanced `{...}` block from the start of a string.
fn extract_balanced_braces(s: &str) -> Option<String> {
    if !s.starts_with('{') {
        return None;
    }

    let mut depth = 0;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, c) in s.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match c {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(s[..=i].to_string());
                }
            }
            _ => {}
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intent_from_clean_json() {
        let call = parse_tool_intent(
            r#"{"name": "advanced_math_operation", "arguments": {"operation": "add", "a": 1, "b": 2}}"#,
        )
        .unwrap();
        assert_eq!(call.id, "tool_0");
        assert_eq!(call.name, "advanced_math_operation");
        let args: Value = serde_json::from_str(&call.arguments).unwrap();
        assert_eq!(args["operation"], "add");
    }

    #[test]
    fn intent_from_python_flavored_json() {
        let call = parse_tool_intent(
            r#"{'name': 'generate_tree_config', 'arguments': {'valid': True, 'missing': None,}}"#,
        )
        .unwrap();
        assert_eq!(call.name, "generate_tree_config");
        let args: Value = serde_json::from_str(&call.arguments).unwrap();
        assert_eq!(args["valid"], true);
        assert!(args["missing"].is_null());
    }

    #[test]
    fn intent_embedded_in_prose() {
        let text = r#"Sure, I'll call the tool: {"name": "t", "arguments": {"x": 1}} and that's it."#;
        let call = parse_tool_intent(text).unwrap();
        assert_eq!(call.name, "t");
    }

    #[test]
    fn wrapped_intent_is_unwrapped() {
        let call =
            parse_tool_intent(r#"{"tool_call": {"name": "t", "arguments": {}}}"#).unwrap();
        assert_eq!(call.name, "t");
    }

    #[test]
    fn non_json_text_yields_none() {
        assert!(parse_tool_intent("I don't need any tools for that.").is_none());
    }

    #[test]
    fn json_without_name_yields_none() {
        assert!(parse_tool_intent(r#"{"arguments": {"a": 1}}"#).is_none());
    }

    #[test]
    fn lenient_parse_handles_unquoted_keys() {
        let val = parse_json_lenient(r#"{name: "t", arguments: {}}"#).unwrap();
        assert_eq!(val["name"], "t");
    }
}
