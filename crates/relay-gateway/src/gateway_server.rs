use std::collections::VecDeque;
use std::net::SocketAddr;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{
    header::{ORIGIN, UPGRADE},
    HeaderMap, StatusCode,
};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use relay_access::{AllowList, TokenVerifier};
use relay_ai::CompletionClient;
use relay_session::{ContextWindow, ConversationSession};
use serde::Serialize;
use serde_json::json;
use tokio::net::TcpListener;

use crate::gateway_ws_protocol::{
    parse_inbound_envelope, InboundFrameError, END_OF_TURN_MARKER, INVALID_FORMAT_NOTICE,
    PROCESSING_ERROR_NOTICE, UNAUTHORIZED_NOTICE,
};

mod connection;
mod origin_gate;
mod relay_cycle;
mod server_bootstrap;
mod status_runtime;

use connection::run_gateway_ws_connection;
use origin_gate::enforce_allowed_origin;
use status_runtime::{GatewayRuntimeCounters, GatewayStatusReport};

pub use server_bootstrap::{build_gateway_router, run_gateway_server};

pub const GATEWAY_ENTRY_ENDPOINT: &str = "/";
pub const GATEWAY_STATUS_ENDPOINT: &str = "/gateway/status";
pub const DEFAULT_MAX_MESSAGE_CHARS: usize = 32_000;
pub const DEFAULT_WS_HEARTBEAT_INTERVAL_SECONDS: u64 = 20;
/// Frames read ahead while an upstream call is in flight. Once full, the
/// socket is left unread until the current cycle finishes.
pub const MAX_QUEUED_INBOUND_FRAMES: usize = 32;
const INBOUND_ENVELOPE_ALLOWANCE_BYTES: usize = 8 * 1024;
const HEALTH_CHECK_BODY: &str = "OK";

#[derive(Clone)]
/// Everything the gateway needs, validated once at startup.
///
/// `client` and `verifier` are process-wide shared resources; every
/// connection task borrows the same instances.
pub struct GatewayServerConfig {
    pub bind: String,
    pub allowed_origin: String,
    pub allow_list: AllowList,
    pub verifier: Arc<dyn TokenVerifier>,
    pub client: Arc<dyn CompletionClient>,
    pub context_window: Arc<dyn ContextWindow>,
    pub model: String,
    pub max_message_chars: usize,
    pub ws_heartbeat_interval_seconds: u64,
}

impl std::fmt::Debug for GatewayServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayServerConfig")
            .field("bind", &self.bind)
            .field("allowed_origin", &self.allowed_origin)
            .field("allow_list", &self.allow_list)
            .field("model", &self.model)
            .field("max_message_chars", &self.max_message_chars)
            .field(
                "ws_heartbeat_interval_seconds",
                &self.ws_heartbeat_interval_seconds,
            )
            .finish_non_exhaustive()
    }
}

impl GatewayServerConfig {
    /// Largest inbound websocket message accepted, in bytes.
    ///
    /// A frame holds at most `max_message_chars` characters of user text (up
    /// to 4 bytes each in UTF-8) plus the JSON envelope and handshake token.
    pub fn max_inbound_frame_bytes(&self) -> usize {
        self.max_message_chars
            .saturating_mul(4)
            .saturating_add(INBOUND_ENVELOPE_ALLOWANCE_BYTES)
    }
}

struct GatewayServerState {
    config: GatewayServerConfig,
    connection_sequence: AtomicU64,
    counters: GatewayRuntimeCounters,
}

impl GatewayServerState {
    fn new(config: GatewayServerConfig) -> Self {
        Self {
            config,
            connection_sequence: AtomicU64::new(0),
            counters: GatewayRuntimeCounters::default(),
        }
    }

    fn next_connection_id(&self) -> String {
        let sequence = self.connection_sequence.fetch_add(1, Ordering::Relaxed) + 1;
        format!("conn_{sequence:016x}")
    }
}

/// JSON error envelope for the plain HTTP surface.
#[derive(Debug)]
struct GatewayApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl GatewayApiError {
    fn forbidden(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::FORBIDDEN,
            code,
            message: message.into(),
        }
    }
}

impl IntoResponse for GatewayApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({
                "error": {
                    "code": self.code,
                    "message": self.message,
                }
            })),
        )
            .into_response()
    }
}

async fn handle_gateway_entry(
    State(state): State<Arc<GatewayServerState>>,
    headers: HeaderMap,
    websocket: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let websocket = match websocket {
        Ok(websocket) => websocket,
        Err(_) if !headers.contains_key(UPGRADE) => {
            return (StatusCode::OK, HEALTH_CHECK_BODY).into_response();
        }
        Err(rejection) => return rejection.into_response(),
    };
    if let Err(error) = enforce_allowed_origin(&state.config.allowed_origin, &headers) {
        return error.into_response();
    }

    let frame_limit = state.config.max_inbound_frame_bytes();
    websocket
        .max_message_size(frame_limit)
        .max_frame_size(frame_limit)
        .on_upgrade(move |socket| run_gateway_ws_connection(state, socket))
        .into_response()
}

async fn handle_gateway_status(State(state): State<Arc<GatewayServerState>>) -> Response {
    Json(GatewayStatusReport::collect(&state)).into_response()
}
