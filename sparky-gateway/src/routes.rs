//! Route definitions for the Sparky gateway.
//!
//! Provides the chat page, the chat endpoint, and health checks.

use crate::chat::{ChatInput, ChatService, ReplyStatus};
use crate::cookie::{read_cookie, set_session_cookie};
use crate::page::ChatPage;
use crate::rate_limit::client_id_from_headers;
use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, ConnectInfo, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use sparky_common::config::Config;
use sparky_common::error::{Error, ResultExt};
use sparky_common::logging::RequestContext;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::services::ServeDir;

const SERVICE_NAME: &str = "sparky-gateway";

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub chat: Arc<ChatService>,
    pub page: Arc<ChatPage>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Assemble state from configuration and a chat service.
    pub fn new(config: Config, chat: ChatService) -> anyhow::Result<Self> {
        let page = ChatPage::new(config.server.image_path.clone())?;
        Ok(Self {
            chat: Arc::new(chat),
            page: Arc::new(page),
            config: Arc::new(config),
        })
    }
}

/// Chat request body.
#[derive(Debug, Deserialize)]
pub struct ChatBody {
    #[serde(default)]
    pub message: Option<serde_json::Value>,
}

/// Chat response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatReply {
    pub reply: String,
}

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub time: String,
    pub abacus_configured: bool,
    pub version: String,
    pub service: String,
    pub sessions: usize,
}

/// Build the complete router.
pub fn build_all_routes(state: AppState) -> Router {
    let static_dir = state.config.server.static_dir.clone();

    Router::new()
        .route("/", get(index_handler))
        .route("/chat", post(chat_handler))
        .route("/health", get(health_handler))
        .nest_service("/static", ServeDir::new(static_dir))
        .with_state(state)
}

/// Extract the message from a chat body.
///
/// A missing or `null` message is the empty string; anything other than a
/// string is invalid input.
pub fn parse_chat_message(body: &[u8]) -> sparky_common::Result<String> {
    if body.is_empty() {
        return Ok(String::new());
    }

    let parsed: ChatBody = serde_json::from_slice(body).context("parsing chat body")?;
    match parsed.message {
        None | Some(serde_json::Value::Null) => Ok(String::new()),
        Some(serde_json::Value::String(s)) => Ok(s),
        Some(other) => Err(Error::InvalidInput(format!(
            "message must be a string, got {other}"
        ))),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// Serve the chat page, issuing a session cookie to first-time visitors.
async fn index_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let html = match state.page.render() {
        Ok(html) => html,
        Err(e) => {
            tracing::error!(error = %e, "Failed to render chat page");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Failed to render page").into_response();
        }
    };

    let session = &state.config.session;
    let mut response_headers = HeaderMap::new();
    if read_cookie(&headers, &session.cookie_name).is_none() {
        let session_id = uuid::Uuid::new_v4().to_string();
        set_session_cookie(
            &mut response_headers,
            &session.cookie_name,
            &session_id,
            session.cookie_max_age_secs,
        );
    }

    (response_headers, Html(html)).into_response()
}

/// Resolve a chat message.
async fn chat_handler(
    State(state): State<AppState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let ctx = RequestContext::from_headers(&headers, SERVICE_NAME);
    let session = &state.config.session;

    let message = match body {
        Ok(body) => parse_chat_message(&body).unwrap_or_else(|e| {
            tracing::debug!(trace_id = %ctx.trace_id, error = %e, "Treating unreadable chat body as empty");
            String::new()
        }),
        Err(rejection) => {
            tracing::info!(
                trace_id = %ctx.trace_id,
                status = rejection.status().as_u16(),
                error = %rejection.body_text(),
                "Chat body rejected; treating as empty"
            );
            String::new()
        }
    };
    let session_token = read_cookie(&headers, &session.cookie_name);

    let outcome = state
        .chat
        .handle(ChatInput {
            client_id: client_id_from_headers(&headers, peer.map(|ConnectInfo(addr)| addr)),
            session_token: session_token.clone(),
            message,
            trace_id: ctx.trace_id.clone(),
        })
        .await;

    let status = match outcome.status {
        ReplyStatus::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        ReplyStatus::Replied | ReplyStatus::EmptyInput => StatusCode::OK,
    };

    let mut response_headers = HeaderMap::new();
    ctx.to_headers(&mut response_headers);
    if let Some(session_id) = outcome.session_id.as_deref().or(session_token.as_deref()) {
        set_session_cookie(
            &mut response_headers,
            &session.cookie_name,
            session_id,
            session.cookie_max_age_secs,
        );
    }
    response_headers.insert(header::CACHE_CONTROL, header::HeaderValue::from_static("no-store"));

    (
        status,
        response_headers,
        Json(ChatReply {
            reply: outcome.reply,
        }),
    )
        .into_response()
}

/// Liveness plus whether the hosted agent is configured.
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        time: chrono::Utc::now().to_rfc3339(),
        abacus_configured: state.chat.provider_configured(),
        version: env!("CARGO_PKG_VERSION").into(),
        service: SERVICE_NAME.into(),
        sessions: state.chat.sessions().len().await,
    })
}
