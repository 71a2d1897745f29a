//! Upstream chat backend client.
//!
//! `ChatBackend` is the seam between the pipeline and the network: the real
//! implementation speaks the OpenAI Chat Completions API over HTTP, tests
//! substitute a scripted one.

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use crate::protocol::{ChatMessage, ToolCall};

/// One completion request against a resolved backend.
#[derive(Debug, Clone)]
pub struct StageRequest {
    /// OpenAI-compatible API base, e.g. `http://host:11434/v1`.
    pub base_url: String,
    pub model: String,
    pub messages: Vec<ChatMessage>,
    /// OpenAI `tools` entries. When present, `tool_choice` is set to "auto".
    pub tools: Option<Vec<Value>>,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Parsed buffered completion.
#[derive(Debug, Clone, Default)]
pub struct ChatOutcome {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
}

#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Buffered completion.
    async fn chat(&self, request: &StageRequest) -> Result<ChatOutcome, String>;

    /// Streaming completion. Yields each raw upstream chunk; the stream ends
    /// at the `[DONE]` sentinel or after an `Err` item.
    async fn chat_stream(
        &self,
        request: &StageRequest,
    ) -> Result<mpsc::Receiver<Result<Value, String>>, String>;
}

pub struct OpenAiBackend {
    client: reqwest::Client,
}

impl OpenAiBackend {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    async fn send_request(
        &self,
        request: &StageRequest,
        stream: bool,
    ) -> Result<reqwest::Response, String> {
        let url = format!("{}/chat/completions", request.base_url);
        let resp = self
            .client
            .post(&url)
            .json(&build_request_body(request, stream))
            .send()
            .await
            .map_err(|e| format!("Request to {} failed: {}", url, e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(format!("HTTP {} from {}: {}", status, url, body));
        }
        Ok(resp)
    }
}

impl Default for OpenAiBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatBackend for OpenAiBackend {
    async fn chat(&self, request: &StageRequest) -> Result<ChatOutcome, String> {
        let resp = self.send_request(request, false).await?;
        let value: Value = resp
            .json()
            .await
            .map_err(|e| format!("Invalid completion body: {}", e))?;
        Ok(parse_chat_completion(&value))
    }

    async fn chat_stream(
        &self,
        request: &StageRequest,
    ) -> Result<mpsc::Receiver<Result<Value, String>>, String> {
        let mut resp = self.send_request(request, true).await?;
        let (tx, rx) = mpsc::channel(64);

        tokio::spawn(async move {
            let mut buffer = LineBuffer::new();
            loop {
                match resp.chunk().await {
                    Ok(Some(bytes)) => {
                        buffer.push(&bytes);
                        // SSE lines arrive split across network chunks
                        while let Some(line) = buffer.next_line() {
                            if let Some(data) = line.strip_prefix("data: ") {
                                if data == "[DONE]" {
                                    return;
                                }
                                match serde_json::from_str::<Value>(data) {
                                    Ok(value) => {
                                        if tx.send(Ok(value)).await.is_err() {
                                            // Consumer is gone
                                            return;
                                        }
                                    }
                                    Err(e) => {
                                        println!(
                                            "[OpenAiBackend] Skipping unparseable stream line: {}",
                                            e
                                        );
                                    }
                                }
                            }
                        }
                    }
                    Ok(None) => return,
                    Err(e) => {
                        let _ = tx.send(Err(format!("Stream read failed: {}", e))).await;
                        return;
                    }
                }
            }
        });

        Ok(rx)
    }
}

/// Byte-level line splitter for the SSE read loop. Decoding happens per
/// complete line, never per network chunk, so a multi-byte UTF-8 code point
/// split across two reads is reassembled before decoding.
struct LineBuffer {
    bytes: Vec<u8>,
}

impl LineBuffer {
    fn new() -> Self {
        Self { bytes: Vec::new() }
    }

    fn push(&mut self, chunk: &[u8]) {
        self.bytes.extend_from_slice(chunk);
    }

    /// Pop the next complete line, trimmed, or `None` if no newline has
    /// arrived yet.
    fn next_line(&mut self) -> Option<String> {
        let pos = self.bytes.iter().position(|&b| b == b'\n')?;
        let line: Vec<u8> = self.bytes.drain(..=pos).collect();
        Some(String::from_utf8_lossy(&line).trim().to_string())
    }
}

fn build_request_body(request: &StageRequest, stream: bool) -> Value {
    let mut body = json!({
        "model": request.model,
        "messages": request.messages,
        "temperature": request.temperature,
        "max_tokens": request.max_tokens,
        "stream": stream,
        // Ollama honors num_predict rather than max_tokens
        "options": {"num_predict": request.max_tokens},
    });
    if let Some(tools) = &request.tools {
        body["tools"] = json!(tools);
        body["tool_choice"] = json!("auto");
    }
    body
}

/// Extract content and native tool calls from a buffered completion body.
fn parse_chat_completion(value: &Value) -> ChatOutcome {
    let message = &value["choices"][0]["message"];
    let content = message["content"].as_str().unwrap_or_default().to_string();

    let mut tool_calls = Vec::new();
    if let Some(calls) = message["tool_calls"].as_array() {
        for call in calls {
            let name = call["function"]["name"].as_str().unwrap_or_default();
            if name.is_empty() {
                continue;
            }
            tool_calls.push(ToolCall {
                id: call["id"].as_str().unwrap_or_default().to_string(),
                name: name.to_string(),
                arguments: call["function"]["arguments"]
                    .as_str()
                    .unwrap_or_default()
                    .to_string(),
            });
        }
    }

    ChatOutcome {
        content,
        tool_calls,
    }
}
