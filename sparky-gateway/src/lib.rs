//! Sparky Gateway - Web chat front-end for a hosted chat agent.
//!
//! This crate provides:
//! - Per-client sliding window rate limiting
//! - Cookie-keyed in-memory conversation sessions with bounded transcripts
//! - Forwarding to the hosted agent with keyword fallback replies
//! - The chat page, chat endpoint, and health check
//!
//! ## Architecture
//!
//! ```text
//! Browser → Gateway (rate limit → session → agent | fallback) → reply
//!                                  ↑                 ↓
//!                          background sweep    append to transcript
//! ```

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod chat;
pub mod cookie;
pub mod fallback;
pub mod page;
pub mod provider;
pub mod rate_limit;
pub mod routes;
pub mod session;

pub use chat::{ChatInput, ChatOutcome, ChatService, ReplySource, ReplyStatus};
pub use provider::{AbacusProvider, ChatProvider, ChatRequest, ChatResponse, ProviderError};
pub use rate_limit::RateLimiter;
pub use routes::AppState;
pub use session::{Message, Role, Session, SessionStore};

use axum::extract::DefaultBodyLimit;
use axum::Router;
use sparky_common::config::Config;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::cors::{Any, CorsLayer};

/// Build the gateway router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    // Checked at body extraction; the chat handler turns the rejection into a reply
    let body_limit = DefaultBodyLimit::max(state.config.server.max_body_bytes);

    routes::build_all_routes(state).layer(body_limit).layer(cors)
}

/// Periodically evict expired sessions and idle rate limit entries.
///
/// Complements the per-request pruning so memory is reclaimed even when
/// traffic stops.
pub fn spawn_sweeper(chat: Arc<ChatService>, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // First tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let sessions = chat.sessions().prune_expired().await;
            let clients = chat.limiter().sweep_idle(Instant::now());
            if sessions > 0 || clients > 0 {
                tracing::debug!(sessions, clients, "Background sweep evicted entries");
            }
        }
    })
}

/// Start the gateway server.
pub async fn start_server(config: Config) -> anyhow::Result<()> {
    let addr: SocketAddr = config.listen_address().parse()?;
    let sweep_interval = config.session.sweep_interval_secs;

    let chat = ChatService::from_config(&config);
    if chat.provider_configured() {
        tracing::info!("Hosted agent configured");
    } else {
        tracing::warn!("Hosted agent credentials missing; all replies will use fallbacks");
    }

    let state = AppState::new(config, chat)?;
    let sweeper = (sweep_interval > 0)
        .then(|| spawn_sweeper(state.chat.clone(), Duration::from_secs(sweep_interval)));

    let router = build_router(state);

    tracing::info!("Starting Sparky Gateway on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    if let Some(handle) = sweeper {
        handle.abort();
    }
    tracing::info!("Sparky Gateway stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
