//! In-memory conversation sessions.
//!
//! Sessions are keyed by an opaque random id carried in a cookie. The store
//! owns every session; callers only ever receive snapshots, and mutate through
//! the store by id. Transcripts are bounded by entry count.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sparky_common::config::SessionConfig;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;

/// Message role in a conversation transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Visitor message
    User,
    /// Reply produced by the agent or the fallback classifier
    Assistant,
}

impl Role {
    /// Wire representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A single transcript entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// A visitor's conversation.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    /// Chronological transcript, oldest first
    pub messages: Vec<Message>,
}

impl Session {
    fn new(id: String, now: DateTime<Utc>) -> Self {
        Self {
            id,
            created_at: now,
            last_seen_at: now,
            messages: Vec::new(),
        }
    }

    /// Whether the session has been idle for longer than `ttl`.
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now.signed_duration_since(self.last_seen_at)
            .to_std()
            .is_ok_and(|idle| idle > ttl)
    }
}

/// Keep only the most recent `max_entries` messages, preserving order.
pub fn trim_history(messages: &mut Vec<Message>, max_entries: usize) {
    if messages.len() > max_entries {
        let excess = messages.len() - max_entries;
        messages.drain(..excess);
    }
}

/// Process-wide session table.
#[derive(Debug)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
    ttl: Duration,
    max_entries: usize,
}

impl SessionStore {
    /// Create a store evicting sessions idle longer than `ttl` and keeping
    /// `max_history` message pairs per transcript.
    pub fn new(ttl: Duration, max_history: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
            max_entries: max_history.saturating_mul(2),
        }
    }

    /// Create a store from configuration.
    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(config.ttl(), config.max_history)
    }

    /// Maximum transcript length.
    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Resolve the session for a presented token, creating one when the token
    /// is missing, empty, or unknown.
    pub async fn get_or_create(&self, token: Option<&str>) -> (String, Session) {
        self.get_or_create_at(token, Utc::now()).await
    }

    /// [`get_or_create`](Self::get_or_create) at an explicit instant.
    pub async fn get_or_create_at(
        &self,
        token: Option<&str>,
        now: DateTime<Utc>,
    ) -> (String, Session) {
        let mut sessions = self.sessions.write().await;

        if let Some(token) = token.filter(|t| !t.is_empty()) {
            if let Some(session) = sessions.get_mut(token) {
                session.last_seen_at = now;
                return (session.id.clone(), session.clone());
            }
        }

        let id = uuid::Uuid::new_v4().to_string();
        let session = Session::new(id.clone(), now);
        sessions.insert(id.clone(), session.clone());
        tracing::debug!(session_id = %id, "Created session");
        (id, session)
    }

    /// Append a message and trim the transcript.
    ///
    /// Returns `false` if the session no longer exists.
    pub async fn append_message(&self, id: &str, role: Role, content: impl Into<String>) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(id) {
            Some(session) => {
                session.messages.push(Message::new(role, content));
                trim_history(&mut session.messages, self.max_entries);
                true
            }
            None => false,
        }
    }

    /// Remove sessions idle longer than the TTL. Returns how many were removed.
    pub async fn prune_expired(&self) -> usize {
        self.prune_expired_at(Utc::now()).await
    }

    /// [`prune_expired`](Self::prune_expired) at an explicit instant.
    pub async fn prune_expired_at(&self, now: DateTime<Utc>) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired(now, self.ttl));
        before - sessions.len()
    }

    /// Snapshot of a session.
    pub async fn get(&self, id: &str) -> Option<Session> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Snapshot of a session's transcript (empty when unknown).
    pub async fn transcript(&self, id: &str) -> Vec<Message> {
        self.sessions
            .read()
            .await
            .get(id)
            .map(|s| s.messages.clone())
            .unwrap_or_default()
    }

    /// Number of live sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
