//! Two-stage toolchain orchestration.
//!
//! Stage one elicits tool calls from the model (temperature pinned to zero,
//! tools advertised, `tool_choice` auto). Calls are validated and executed,
//! then stage two asks the same backend to synthesize a final answer from
//! the results, at the caller's temperature and without tools.
//!
//! Neither stage is ever retried. A failure at any point surfaces as a
//! structured outcome: a `__global__` validation entry in buffered mode, an
//! `error` event in streaming mode.

use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::backend::{ChatBackend, StageRequest};
use crate::events::StreamEvent;
use crate::protocol::{
    CancelPayload, ChatMessage, ChunkPayload, ContentPayload, DonePayload, ErrorPayload, ToolCall,
    ToolchainResponse, ValidationResult, GLOBAL_VALIDATION_KEY,
};
use crate::stream_assembly::{extract_content_delta, map_by_name, ChunkAggregator};
use crate::tool_parsing::parse_tool_intent;
use crate::tool_registry::ToolRegistry;

/// Elicitation runs deterministic regardless of the caller's setting.
const STAGE_ONE_TEMPERATURE: f32 = 0.0;

/// Parameters shared by both toolchain modes.
#[derive(Debug, Clone)]
pub struct ToolchainParams {
    pub stage_id: String,
    pub base_url: String,
    pub model: String,
    pub user_prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

fn stage_one_request(registry: &ToolRegistry, params: &ToolchainParams) -> StageRequest {
    StageRequest {
        base_url: params.base_url.clone(),
        model: params.model.clone(),
        messages: vec![
            ChatMessage::system(registry.steering_prompt()),
            ChatMessage::user(&params.user_prompt),
        ],
        tools: Some(registry.all_specs()),
        temperature: STAGE_ONE_TEMPERATURE,
        max_tokens: params.max_tokens,
    }
}

/// Follow-up conversation: the original exchange, the assistant's tool
/// calls replayed, and one `tool` message per call with its result.
fn stage_two_request(
    registry: &ToolRegistry,
    params: &ToolchainParams,
    calls: &[ToolCall],
    results: &BTreeMap<String, String>,
) -> StageRequest {
    let mut messages = vec![
        ChatMessage::system(registry.steering_prompt()),
        ChatMessage::user(&params.user_prompt),
        ChatMessage::assistant_with_tool_calls(calls),
    ];
    for call in calls {
        let content = results.get(&call.name).cloned().unwrap_or_default();
        messages.push(ChatMessage::tool_result(&call.id, content));
    }

    StageRequest {
        base_url: params.base_url.clone(),
        model: params.model.clone(),
        messages,
        tools: None,
        temperature: params.temperature,
        max_tokens: params.max_tokens,
    }
}

/// Fall back to parsing the assistant's plain text as a tool intent when no
/// structured calls came back.
fn recover_calls(mut calls: Vec<ToolCall>, content: &str) -> Vec<ToolCall> {
    if calls.is_empty() {
        if let Some(call) = parse_tool_intent(content) {
            println!(
                "[Toolchain] Recovered tool intent from plain text: {}",
                call.name
            );
            calls.push(call);
        }
    }
    calls
}

// ============ Buffered Mode ============

pub async fn run_buffered(
    backend: &dyn ChatBackend,
    registry: &ToolRegistry,
    params: &ToolchainParams,
) -> ToolchainResponse {
    println!(
        "[Toolchain] Stage one (buffered) stage_id={} model={}",
        params.stage_id, params.model
    );

    let outcome = match backend.chat(&stage_one_request(registry, params)).await {
        Ok(outcome) => outcome,
        Err(e) => return ToolchainResponse::aborted(e),
    };

    let calls = recover_calls(outcome.tool_calls, &outcome.content);
    if calls.is_empty() {
        return ToolchainResponse::aborted("No tool calls returned");
    }

    let call_map = map_by_name(calls.clone());
    let validation = registry.validate_all(&call_map);
    if validation.values().any(|v| !v.valid) {
        let mut merged = BTreeMap::new();
        merged.insert(
            GLOBAL_VALIDATION_KEY.to_string(),
            ValidationResult::rejected("One or more tool calls failed validation"),
        );
        merged.extend(validation);
        return ToolchainResponse {
            final_response: String::new(),
            tool_results: BTreeMap::new(),
            validation: merged,
        };
    }

    let tool_results = registry.execute_all(&call_map);

    println!(
        "[Toolchain] Stage two (buffered) stage_id={} tools={}",
        params.stage_id,
        tool_results.len()
    );
    let final_response = match backend
        .chat(&stage_two_request(registry, params, &calls, &tool_results))
        .await
    {
        Ok(outcome) => outcome.content,
        Err(e) => return ToolchainResponse::aborted(e),
    };

    ToolchainResponse {
        final_response,
        tool_results,
        validation,
    }
}

// ============ Streaming Mode ============

enum StreamExit {
    /// Consumer went away. Stop immediately, no further backend calls.
    Cancelled,
    Failed {
        error: String,
        details: Option<Value>,
    },
}

impl StreamExit {
    fn failed(error: impl Into<String>) -> Self {
        Self::Failed {
            error: error.into(),
            details: None,
        }
    }
}

/// Drive the full pipeline, emitting events into `tx`. The function owns the
/// terminal frame: `done` on success, `cancel` on consumer disconnect,
/// `error` otherwise. Terminal sends are best-effort since the consumer may
/// already be gone.
pub async fn run_streaming(
    backend: Arc<dyn ChatBackend>,
    registry: Arc<ToolRegistry>,
    params: ToolchainParams,
    tx: mpsc::Sender<StreamEvent>,
) {
    let stage_id = params.stage_id.clone();
    match stream_pipeline(backend.as_ref(), &registry, &params, &tx).await {
        Ok(seq) => {
            let _ = tx
                .send(StreamEvent::Done {
                    seq,
                    payload: DonePayload { stage_id },
                })
                .await;
        }
        Err(StreamExit::Cancelled) => {
            println!("[Toolchain] Consumer disconnected, stage_id={}", stage_id);
            let _ = tx
                .send(StreamEvent::Cancel(CancelPayload { stage_id }))
                .await;
        }
        Err(StreamExit::Failed { error, details }) => {
            println!("[Toolchain] Stream failed, stage_id={}: {}", stage_id, error);
            let _ = tx
                .send(StreamEvent::Error(ErrorPayload {
                    stage_id,
                    error,
                    details,
                }))
                .await;
        }
    }
}

async fn stream_pipeline(
    backend: &dyn ChatBackend,
    registry: &ToolRegistry,
    params: &ToolchainParams,
    tx: &mpsc::Sender<StreamEvent>,
) -> Result<u64, StreamExit> {
    let mut seq: u64 = 0;
    let mut aggregator = ChunkAggregator::new();
    let mut content = String::new();

    println!(
        "[Toolchain] Stage one (streaming) stage_id={} model={}",
        params.stage_id, params.model
    );
    let mut rx = backend
        .chat_stream(&stage_one_request(registry, params))
        .await
        .map_err(StreamExit::failed)?;

    loop {
        tokio::select! {
            _ = tx.closed() => return Err(StreamExit::Cancelled),
            item = rx.recv() => match item {
                Some(Ok(chunk)) => {
                    aggregator.add_chunk(&chunk);
                    if let Some(text) = extract_content_delta(&chunk) {
                        content.push_str(&text);
                    }
                    let event = StreamEvent::Chunk {
                        seq,
                        payload: ChunkPayload {
                            stage_id: params.stage_id.clone(),
                            chunk,
                        },
                    };
                    if tx.send(event).await.is_err() {
                        return Err(StreamExit::Cancelled);
                    }
                    seq += 1;
                }
                Some(Err(e)) => return Err(StreamExit::failed(e)),
                None => break,
            }
        }
    }

    let calls = recover_calls(aggregator.finalize(), &content);
    if calls.is_empty() {
        return Err(StreamExit::failed("No tool calls returned"));
    }

    let call_map = map_by_name(calls.clone());
    let validation = registry.validate_all(&call_map);
    if validation.values().any(|v| !v.valid) {
        return Err(StreamExit::Failed {
            error: "validation failed".to_string(),
            details: serde_json::to_value(&validation).ok(),
        });
    }

    let tool_results = registry.execute_all(&call_map);

    // Consumer may have left while tools ran; never start stage two for a
    // dead stream.
    if tx.is_closed() {
        return Err(StreamExit::Cancelled);
    }

    println!(
        "[Toolchain] Stage two (streaming) stage_id={} tools={}",
        params.stage_id,
        tool_results.len()
    );
    let mut rx = backend
        .chat_stream(&stage_two_request(registry, params, &calls, &tool_results))
        .await
        .map_err(StreamExit::failed)?;

    loop {
        tokio::select! {
            _ = tx.closed() => return Err(StreamExit::Cancelled),
            item = rx.recv() => match item {
                Some(Ok(chunk)) => {
                    if let Some(text) = extract_content_delta(&chunk) {
                        let event = StreamEvent::Content {
                            seq,
                            payload: ContentPayload {
                                stage_id: params.stage_id.clone(),
                                content: text,
                            },
                        };
                        if tx.send(event).await.is_err() {
                            return Err(StreamExit::Cancelled);
                        }
                        seq += 1;
                    }
                }
                Some(Err(e)) => return Err(StreamExit::failed(e)),
                None => break,
            }
        }
    }

    Ok(seq)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params() -> ToolchainParams {
        ToolchainParams {
            stage_id: "s1".to_string(),
            base_url: "http://host/v1".to_string(),
            model: "llama3".to_string(),
            user_prompt: "add 1 and 2".to_string(),
            temperature: 0.9,
            max_tokens: 256,
        }
    }

    #[test]
    fn stage_one_pins_temperature_and_advertises_tools() {
        let registry = ToolRegistry::builtin();
        let request = stage_one_request(&registry, &params());
        assert_eq!(request.temperature, 0.0);
        assert_eq!(request.tools.as_ref().map(|t| t.len()), Some(2));
        assert_eq!(request.messages[0].role, "system");
        assert_eq!(request.messages[1].content, "add 1 and 2");
    }

    #[test]
    fn stage_two_uses_caller_temperature_and_no_tools() {
        let registry = ToolRegistry::builtin();
        let calls = vec![ToolCall {
            id: "call_1".to_string(),
            name: "advanced_math_operation".to_string(),
            arguments: json!({"operation": "add", "a": 1, "b": 2}).to_string(),
        }];
        let results: BTreeMap<String, String> =
            [("advanced_math_operation".to_string(), "3".to_string())]
                .into_iter()
                .collect();

        let request = stage_two_request(&registry, &params(), &calls, &results);
        assert_eq!(request.temperature, 0.9);
        assert!(request.tools.is_none());

        // system, user, assistant replay, one tool message
        assert_eq!(request.messages.len(), 4);
        assert_eq!(request.messages[2].role, "assistant");
        let tool_msg = &request.messages[3];
        assert_eq!(tool_msg.role, "tool");
        assert_eq!(tool_msg.tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(tool_msg.content, "3");
    }

    #[test]
    fn recover_calls_leaves_structured_calls_alone() {
        let structured = vec![ToolCall {
            id: "native".to_string(),
            name: "advanced_math_operation".to_string(),
            arguments: "{}".to_string(),
        }];
        let calls = recover_calls(structured, r#"{"name":"other","arguments":{}}"#);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "native");
    }

    #[test]
    fn recover_calls_parses_plain_text_intent() {
        let calls = recover_calls(
            Vec::new(),
            r#"{"name": "advanced_math_operation", "arguments": {"operation": "add", "a": 1, "b": 2}}"#,
        );
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "tool_0");
    }
}
