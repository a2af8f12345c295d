//! Hosted chat agent client.
//!
//! The agent is an Abacus ChatLLM deployment reached at
//! `POST {base_url}/api/v1/chat/{agent_id}` with a bearer token. A reply is
//! the `content` of the first choice's message; any other shape is an error
//! that the chat flow answers with a fallback reply.

use crate::session::Message;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use sparky_common::config::ProviderConfig;
use sparky_common::logging::TRACE_ID_HEADER;
use std::time::Instant;
use thiserror::Error;

// ============================================================================
// Provider Trait
// ============================================================================

/// Interface to a chat-completion backend.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Provider name for logging.
    fn name(&self) -> &str;

    /// Send a chat completion request.
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError>;
}

/// Error from a provider call.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("request timed out")]
    Timeout,

    #[error("API error {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to parse response: {0}")]
    Decode(String),

    #[error("response contained no reply text")]
    MissingContent,
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Chat request sent to the agent.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    /// Transcript, oldest first
    pub messages: Vec<Message>,
    pub max_tokens: u32,
    pub temperature: f64,
    /// Propagated as `X-Trace-Id`; not part of the body
    #[serde(skip)]
    pub trace_id: Option<String>,
}

/// Successful reply.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: String,
    pub latency_ms: u64,
}

#[derive(Debug, Deserialize)]
struct AgentResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<serde_json::Value>,
}

impl AgentResponse {
    fn reply_text(self) -> Option<String> {
        let content = self.choices.into_iter().next()?.message?.content?;
        match content {
            serde_json::Value::String(s) if !s.is_empty() => Some(s),
            _ => None,
        }
    }
}

// ============================================================================
// Abacus Provider
// ============================================================================

/// Abacus ChatLLM agent provider.
pub struct AbacusProvider {
    client: reqwest::Client,
    endpoint: String,
}

impl AbacusProvider {
    /// Create a provider for `agent_id` at `base_url`.
    pub fn new(
        api_key: &str,
        agent_id: &str,
        base_url: &str,
        timeout: std::time::Duration,
    ) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Ok(mut value) = HeaderValue::from_str(&format!("Bearer {}", api_key)) {
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            endpoint: format!(
                "{}/api/v1/chat/{}",
                base_url.trim_end_matches('/'),
                agent_id
            ),
        }
    }

    /// Build a provider from configuration, or `None` when credentials are missing.
    pub fn from_config(config: &ProviderConfig) -> Option<Self> {
        let (api_key, agent_id) = config.credentials()?;
        Some(Self::new(
            api_key,
            agent_id,
            &config.base_url,
            config.timeout(),
        ))
    }

    /// Full endpoint URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ChatProvider for AbacusProvider {
    fn name(&self) -> &str {
        "abacus"
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError> {
        let start = Instant::now();

        let mut builder = self.client.post(&self.endpoint).json(&request);
        if let Some(trace_id) = &request.trace_id {
            builder = builder.header(TRACE_ID_HEADER, trace_id);
        }

        let response = builder.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: AgentResponse = response.json().await?;
        let content = parsed.reply_text().ok_or(ProviderError::MissingContent)?;

        Ok(ChatResponse {
            content,
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Role;
    use std::time::Duration;

    #[test]
    fn test_chat_request_serialization() {
        let request = ChatRequest {
            messages: vec![
                Message::new(Role::User, "Hello"),
                Message::new(Role::Assistant, "Hi"),
            ],
            max_tokens: 500,
            temperature: 0.7,
            trace_id: Some("trace-1".into()),
        };

        let json: serde_json::Value = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][1]["content"], "Hi");
        assert_eq!(json["max_tokens"], 500);
        assert_eq!(json["temperature"], 0.7);
        assert!(json.get("trace_id").is_none());
    }

    #[test]
    fn test_reply_text_extraction() {
        let ok: AgentResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":"Hi there"}}]}"#).unwrap();
        assert_eq!(ok.reply_text().as_deref(), Some("Hi there"));

        for body in [
            r#"{}"#,
            r#"{"choices":[]}"#,
            r#"{"choices":[{}]}"#,
            r#"{"choices":[{"message":{}}]}"#,
            r#"{"choices":[{"message":{"content":""}}]}"#,
            r#"{"choices":[{"message":{"content":42}}]}"#,
        ] {
            let parsed: AgentResponse = serde_json::from_str(body).unwrap();
            assert!(parsed.reply_text().is_none(), "expected no reply for {body}");
        }
    }

    #[test]
    fn test_endpoint_construction() {
        let provider = AbacusProvider::new(
            "key",
            "agent-42",
            "https://chatllm.abacus.ai/",
            Duration::from_secs(10),
        );
        assert_eq!(
            provider.endpoint(),
            "https://chatllm.abacus.ai/api/v1/chat/agent-42"
        );
        assert_eq!(provider.name(), "abacus");
    }

    #[test]
    fn test_from_config_requires_credentials() {
        let mut config = ProviderConfig::default();
        assert!(AbacusProvider::from_config(&config).is_none());

        config.api_key = Some("key".into());
        assert!(AbacusProvider::from_config(&config).is_none());

        config.agent_id = Some("agent".into());
        assert!(AbacusProvider::from_config(&config).is_some());
    }
}
