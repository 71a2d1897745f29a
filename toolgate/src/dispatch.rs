//! Protocol dispatch: resolved routes to concrete handlers.
//!
//! Only the OpenAI-compatible protocol is implemented; routes that resolve
//! to "mcp" are rejected with 501 at dispatch time.

use axum::response::sse::{KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::StreamExt;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::backend::{ChatBackend, StageRequest};
use crate::events::StreamEvent;
use crate::model_routes::{Protocol, ResolvedRoute};
use crate::protocol::{
    CancelPayload, ChatMessage, ChatResponse, ChunkPayload, DonePayload, ErrorPayload, LLMRequest,
};
use crate::routes::{AppState, GatewayError};
use crate::toolchain::{self, ToolchainParams};

const EVENT_CHANNEL_CAPACITY: usize = 64;

fn require_openai(route: &ResolvedRoute) -> Result<(), GatewayError> {
    match route.protocol {
        Protocol::OpenAi => Ok(()),
        Protocol::Mcp => Err(GatewayError::UnsupportedProtocol("mcp".to_string())),
    }
}

fn sse_response(rx: mpsc::Receiver<StreamEvent>) -> Response {
    let stream = ReceiverStream::new(rx).map(|event| Ok::<_, Infallible>(event.into_sse()));
    Sse::new(stream)
        .keep_alive(KeepAlive::default())
        .into_response()
}

// ============ Toolchain ============

pub async fn dispatch_toolchain(
    state: AppState,
    payload: LLMRequest,
    route: ResolvedRoute,
) -> Result<Response, GatewayError> {
    require_openai(&route)?;

    let params = ToolchainParams {
        stage_id: payload.stage_id,
        base_url: route.base_url,
        model: route.model_name,
        user_prompt: payload.user_prompt,
        temperature: payload.temperature,
        max_tokens: payload.max_tokens,
    };

    if payload.stream {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let backend = Arc::clone(&state.backend);
        let registry = Arc::clone(&state.registry);
        tokio::spawn(async move {
            toolchain::run_streaming(backend, registry, params, tx).await;
        });
        Ok(sse_response(rx))
    } else {
        let response = toolchain::run_buffered(state.backend.as_ref(), &state.registry, &params).await;
        Ok(Json(response).into_response())
    }
}

// ============ Plain Chat ============

pub async fn dispatch_chat_completion(
    state: AppState,
    payload: LLMRequest,
    route: ResolvedRoute,
) -> Result<Response, GatewayError> {
    require_openai(&route)?;

    let stage_id = payload.stage_id.clone();
    let request = StageRequest {
        base_url: route.base_url,
        model: route.model_name,
        messages: vec![
            ChatMessage::system(&payload.system_prompt),
            ChatMessage::user(&payload.user_prompt),
        ],
        tools: None,
        temperature: payload.temperature,
        max_tokens: payload.max_tokens,
    };

    if payload.stream {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let backend = Arc::clone(&state.backend);
        tokio::spawn(async move {
            run_chat_stream(backend, request, stage_id, tx).await;
        });
        Ok(sse_response(rx))
    } else {
        let outcome = state
            .backend
            .chat(&request)
            .await
            .map_err(GatewayError::Upstream)?;
        Ok(Json(ChatResponse {
            stage_id,
            content: outcome.content,
        })
        .into_response())
    }
}

/// Forward every upstream chunk verbatim, then close with `done`.
async fn run_chat_stream(
    backend: Arc<dyn ChatBackend>,
    request: StageRequest,
    stage_id: String,
    tx: mpsc::Sender<StreamEvent>,
) {
    let mut rx = match backend.chat_stream(&request).await {
        Ok(rx) => rx,
        Err(e) => {
            let _ = tx
                .send(StreamEvent::Error(ErrorPayload {
                    stage_id,
                    error: e,
                    details: None,
                }))
                .await;
            return;
        }
    };

    let mut seq: u64 = 0;
    loop {
        tokio::select! {
            _ = tx.closed() => {
                let _ = tx
                    .send(StreamEvent::Cancel(CancelPayload {
                        stage_id: stage_id.clone(),
                    }))
                    .await;
                return;
            }
            item = rx.recv() => match item {
                Some(Ok(chunk)) => {
                    let event = StreamEvent::Chunk {
                        seq,
                        payload: ChunkPayload {
                            stage_id: stage_id.clone(),
                            chunk,
                        },
                    };
                    if tx.send(event).await.is_err() {
                        return;
                    }
                    seq += 1;
                }
                Some(Err(e)) => {
                    let _ = tx
                        .send(StreamEvent::Error(ErrorPayload {
                            stage_id: stage_id.clone(),
                            error: e,
                            details: None,
                        }))
                        .await;
                    return;
                }
                None => break,
            }
        }
    }

    let _ = tx
        .send(StreamEvent::Done {
            seq,
            payload: DonePayload { stage_id },
        })
        .await;
}
