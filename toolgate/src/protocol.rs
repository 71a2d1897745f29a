//! Wire types shared across the gateway.
//!
//! Everything the HTTP surface accepts or emits lives here, along with the
//! OpenAI-compatible message shapes sent to upstream backends.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

// ============ Inbound Request ============

/// Payload accepted by the chat and toolchain endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct LLMRequest {
    /// Opaque correlation tag echoed back in every stream event.
    pub stage_id: String,
    pub user_prompt: String,
    #[serde(default)]
    pub system_prompt: String,
    /// Routing key, resolved against the routing table (never a model name).
    pub model_container: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Accepted for wire compatibility. The toolchain always runs the
    /// synthesis stage; this flag is not consulted.
    #[serde(default = "default_true")]
    pub synthesis: bool,
    #[serde(default)]
    pub stream: bool,
}

fn default_max_tokens() -> u32 {
    2048
}

fn default_temperature() -> f32 {
    0.7
}

fn default_true() -> bool {
    true
}

// ============ OpenAI-Compatible Message Shapes ============

/// A single chat message in OpenAI wire format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
    /// Present only on assistant messages that carried structured tool calls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<OpenAIToolCall>>,
    /// Present only on `tool` role messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self::plain("system", content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain("user", content)
    }

    fn plain(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Assistant message replaying the tool calls the model produced.
    pub fn assistant_with_tool_calls(calls: &[ToolCall]) -> Self {
        Self {
            role: "assistant".to_string(),
            content: String::new(),
            tool_calls: Some(calls.iter().map(OpenAIToolCall::from_call).collect()),
            tool_call_id: None,
        }
    }

    /// `tool` role message carrying one execution result.
    pub fn tool_result(call_id: &str, content: impl Into<String>) -> Self {
        Self {
            role: "tool".to_string(),
            content: content.into(),
            tool_calls: None,
            tool_call_id: Some(call_id.to_string()),
        }
    }
}

/// Native tool call in OpenAI wire format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub call_type: String,
    pub function: OpenAIFunctionCall,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIFunctionCall {
    pub name: String,
    /// Arguments as a JSON-encoded string, per the OpenAI spec.
    pub arguments: String,
}

impl OpenAIToolCall {
    fn from_call(call: &ToolCall) -> Self {
        Self {
            id: call.id.clone(),
            call_type: "function".to_string(),
            function: OpenAIFunctionCall {
                name: call.name.clone(),
                arguments: call.arguments.clone(),
            },
        }
    }
}

// ============ Tool Calls ============

/// A complete tool invocation, either reassembled from stream fragments or
/// taken from a buffered response.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Raw JSON-encoded argument string, exactly as the model produced it.
    pub arguments: String,
}

/// Tool calls keyed by tool name. A duplicate name overwrites the earlier
/// entry (last write wins).
pub type ToolCallMap = BTreeMap<String, ToolCall>;

// ============ Validation & Results ============

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationResult {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self {
            valid: true,
            reason: None,
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            reason: Some(reason.into()),
        }
    }
}

/// Key in the validation map for pipeline-wide outcomes that are not tied to
/// a single tool call.
pub const GLOBAL_VALIDATION_KEY: &str = "__global__";

/// Buffered toolchain response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolchainResponse {
    pub final_response: String,
    pub tool_results: BTreeMap<String, String>,
    pub validation: BTreeMap<String, ValidationResult>,
}

impl ToolchainResponse {
    /// Response for a pipeline that stopped before any tool executed.
    pub fn aborted(reason: impl Into<String>) -> Self {
        let mut validation = BTreeMap::new();
        validation.insert(
            GLOBAL_VALIDATION_KEY.to_string(),
            ValidationResult::rejected(reason),
        );
        Self {
            final_response: String::new(),
            tool_results: BTreeMap::new(),
            validation,
        }
    }
}

/// Buffered plain-chat response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub stage_id: String,
    pub content: String,
}

// ============ Stream Event Payloads ============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkPayload {
    pub stage_id: String,
    /// Raw upstream chunk, forwarded verbatim.
    pub chunk: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentPayload {
    pub stage_id: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DonePayload {
    pub stage_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelPayload {
    pub stage_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub stage_id: String,
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_messages_omit_tool_fields() {
        let msg = ChatMessage::user("hello");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "user");
        assert!(json.get("tool_calls").is_none());
        assert!(json.get("tool_call_id").is_none());
    }

    #[test]
    fn assistant_message_replays_tool_calls() {
        let calls = vec![ToolCall {
            id: "call_1".to_string(),
            name: "advanced_math_operation".to_string(),
            arguments: r#"{"operation":"add","a":1,"b":2}"#.to_string(),
        }];
        let msg = ChatMessage::assistant_with_tool_calls(&calls);
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["tool_calls"][0]["type"], "function");
        assert_eq!(
            json["tool_calls"][0]["function"]["name"],
            "advanced_math_operation"
        );
    }

    #[test]
    fn request_defaults_apply() {
        let req: LLMRequest = serde_json::from_str(
            r#"{"stage_id":"s1","user_prompt":"hi","model_container":"traditional"}"#,
        )
        .unwrap();
        assert_eq!(req.max_tokens, 2048);
        assert!(req.synthesis);
        assert!(!req.stream);
    }
}
