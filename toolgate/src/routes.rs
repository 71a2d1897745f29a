//! HTTP surface of the gateway.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;

use crate::backend::ChatBackend;
use crate::dispatch;
use crate::model_routes::RoutingTable;
use crate::protocol::LLMRequest;
use crate::tool_registry::ToolRegistry;

#[derive(Clone)]
pub struct AppState {
    pub routes: Arc<RoutingTable>,
    pub registry: Arc<ToolRegistry>,
    pub backend: Arc<dyn ChatBackend>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/completion/v1/chat", post(chat_completion_handler))
        .route("/completion/v1/toolchain", post(toolchain_handler))
        .with_state(state)
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}

async fn chat_completion_handler(
    State(state): State<AppState>,
    Json(payload): Json<LLMRequest>,
) -> Result<Response, GatewayError> {
    let route = state.routes.resolve(&payload.model_container)?;
    dispatch::dispatch_chat_completion(state, payload, route).await
}

async fn toolchain_handler(
    State(state): State<AppState>,
    Json(payload): Json<LLMRequest>,
) -> Result<Response, GatewayError> {
    let route = state.routes.resolve(&payload.model_container)?;
    dispatch::dispatch_toolchain(state, payload, route).await
}

// ============ Errors ============

/// Request-level failures, mapped onto HTTP statuses. Pipeline failures
/// inside an accepted toolchain request never land here; those surface as
/// structured bodies or stream events.
#[derive(Debug)]
pub enum GatewayError {
    /// Container key absent from the routing table.
    UnknownModel(String),
    /// Container exists but its model or service is not configured.
    Unconfigured(String),
    /// Route resolves to a protocol this gateway does not speak.
    UnsupportedProtocol(String),
    /// Upstream failure on a plain (non-toolchain) buffered request.
    Upstream(String),
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            GatewayError::UnknownModel(detail) => (StatusCode::BAD_REQUEST, detail),
            GatewayError::Unconfigured(detail) => (StatusCode::BAD_REQUEST, detail),
            GatewayError::UnsupportedProtocol(protocol) => (
                StatusCode::NOT_IMPLEMENTED,
                format!("Unsupported protocol: {}", protocol),
            ),
            GatewayError::Upstream(detail) => (StatusCode::BAD_GATEWAY, detail),
        };
        (status, Json(json!({"detail": detail}))).into_response()
    }
}
