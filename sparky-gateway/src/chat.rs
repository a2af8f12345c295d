//! Chat reply resolution.
//!
//! Each request walks a fixed chain with early exits:
//!
//! ```text
//! rate check → empty check → session (append user) → agent call or fallback
//!            → append assistant → prune expired sessions
//! ```
//!
//! Nothing in the chain fails outward: agent errors are logged and answered
//! with a fallback reply.

use crate::fallback::{fallback_reply, EMPTY_INPUT_PROMPT, RATE_LIMIT_NOTICE};
use crate::provider::{AbacusProvider, ChatProvider, ChatRequest};
use crate::rate_limit::RateLimiter;
use crate::session::{Message, Role, SessionStore};
use sparky_common::config::Config;
use std::sync::Arc;
use tracing::Instrument;

/// Inbound chat request after HTTP extraction.
#[derive(Debug, Clone)]
pub struct ChatInput {
    /// Rate limiting key
    pub client_id: String,
    /// Session id presented by the client, if any
    pub session_token: Option<String>,
    /// Raw message text
    pub message: String,
    pub trace_id: String,
}

/// How a request was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyStatus {
    /// A reply was produced (agent or fallback)
    Replied,
    /// Rejected by the rate limiter
    RateLimited,
    /// Message was empty after trimming
    EmptyInput,
}

/// Where the reply text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplySource {
    Agent,
    Fallback,
    Notice,
}

/// Result of resolving one chat request.
#[derive(Debug, Clone)]
pub struct ChatOutcome {
    pub status: ReplyStatus,
    pub reply: String,
    /// Resolved session id; `None` when the request never reached the session stage
    pub session_id: Option<String>,
    pub source: ReplySource,
}

impl ChatOutcome {
    fn notice(status: ReplyStatus, reply: &str) -> Self {
        Self {
            status,
            reply: reply.to_string(),
            session_id: None,
            source: ReplySource::Notice,
        }
    }
}

/// Owns the shared chat state and resolves requests.
pub struct ChatService {
    limiter: Arc<RateLimiter>,
    sessions: Arc<SessionStore>,
    provider: Option<Arc<dyn ChatProvider>>,
    max_tokens: u32,
    temperature: f64,
}

impl ChatService {
    /// Build the service from configuration. The agent is used only when its
    /// credentials are present.
    pub fn from_config(config: &Config) -> Self {
        let provider = AbacusProvider::from_config(&config.provider)
            .map(|p| Arc::new(p) as Arc<dyn ChatProvider>);
        Self::with_provider(config, provider)
    }

    /// Build the service with an explicit provider.
    pub fn with_provider(config: &Config, provider: Option<Arc<dyn ChatProvider>>) -> Self {
        Self {
            limiter: Arc::new(RateLimiter::from_config(&config.rate_limit)),
            sessions: Arc::new(SessionStore::from_config(&config.session)),
            provider,
            max_tokens: config.provider.max_tokens,
            temperature: config.provider.temperature,
        }
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Whether replies can come from the hosted agent.
    pub fn provider_configured(&self) -> bool {
        self.provider.is_some()
    }

    /// Resolve a chat request.
    pub async fn handle(&self, input: ChatInput) -> ChatOutcome {
        let span = sparky_common::request_span!(
            "chat",
            input.trace_id,
            client = %input.client_id
        );
        self.resolve(input).instrument(span).await
    }

    async fn resolve(&self, input: ChatInput) -> ChatOutcome {
        if !self.limiter.allow(&input.client_id) {
            tracing::info!(client = %input.client_id, "Rate limited chat request");
            return ChatOutcome::notice(ReplyStatus::RateLimited, RATE_LIMIT_NOTICE);
        }

        let message = input.message.trim();
        if message.is_empty() {
            return ChatOutcome::notice(ReplyStatus::EmptyInput, EMPTY_INPUT_PROMPT);
        }

        let (session_id, _) = self
            .sessions
            .get_or_create(input.session_token.as_deref())
            .await;
        self.sessions
            .append_message(&session_id, Role::User, message)
            .await;

        let (reply, source) = match &self.provider {
            Some(provider) => {
                match self
                    .ask_provider(provider.as_ref(), &session_id, message, &input.trace_id)
                    .await
                {
                    Some(reply) => (reply, ReplySource::Agent),
                    None => (fallback_reply(message).to_string(), ReplySource::Fallback),
                }
            }
            None => (fallback_reply(message).to_string(), ReplySource::Fallback),
        };

        self.sessions
            .append_message(&session_id, Role::Assistant, reply.clone())
            .await;

        let pruned = self.sessions.prune_expired().await;
        if pruned > 0 {
            tracing::debug!(pruned, "Pruned expired sessions");
        }

        ChatOutcome {
            status: ReplyStatus::Replied,
            reply,
            session_id: Some(session_id),
            source,
        }
    }

    /// Call the agent with the session transcript. `None` means use the fallback.
    async fn ask_provider(
        &self,
        provider: &dyn ChatProvider,
        session_id: &str,
        message: &str,
        trace_id: &str,
    ) -> Option<String> {
        let mut messages = self.sessions.transcript(session_id).await;
        if messages.is_empty() {
            messages.push(Message::new(Role::User, message));
        }

        let request = ChatRequest {
            messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            trace_id: Some(trace_id.to_string()),
        };

        tracing::info!(
            provider = provider.name(),
            session_id = %session_id,
            history = request.messages.len(),
            "Calling chat agent"
        );

        match provider.chat(request).await {
            Ok(response) => {
                tracing::info!(latency_ms = response.latency_ms, "Chat agent replied");
                Some(response.content)
            }
            Err(e) => {
                tracing::warn!(
                    provider = provider.name(),
                    error = %e,
                    "Chat agent call failed; using fallback"
                );
                None
            }
        }
    }
}
