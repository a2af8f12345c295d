//! Configuration management for the Sparky service.
//!
//! Configuration lives in `~/.sparky/config.json`. Every field has a default,
//! so a missing or partial file is valid.
//!
//! # Configuration Priority
//!
//! 1. Environment variables
//! 2. Explicit config file values
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! ## Provider
//! - `ABACUS_API_KEY` → provider.api_key
//! - `ABACUS_AGENT_ID` → provider.agent_id
//! - `ABACUS_BASE_URL` → provider.base_url
//! - `ABACUS_MAX_TOKENS` → provider.max_tokens
//! - `ABACUS_TEMPERATURE` → provider.temperature
//! - `ABACUS_TIMEOUT` → provider.timeout_secs
//!
//! ## Sessions and rate limiting
//! - `SESSION_TTL_HOURS` → session.ttl_hours
//! - `MAX_HISTORY` → session.max_history
//! - `RATE_WINDOW` → rate_limit.window_secs
//! - `RATE_LIMIT` → rate_limit.max_requests
//!
//! ## Server
//! - `PORT` → server.port
//! - `SPARKY_BIND_ADDRESS` → server.bind
//! - `SPARKY_IMAGE_PATH` → server.image_path
//! - `SPARKY_STATIC_DIR` → server.static_dir
//! - `SPARKY_DEBUG` → server.debug
//! - `SPARKY_LOG_LEVEL` → observability.log_level
//! - `SPARKY_LOG_FORMAT` → observability.log_format

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".sparky"),
        |dirs| dirs.home_dir().join(".sparky"),
    )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

// ============================================================================
// Sections
// ============================================================================

/// Hosted chat agent (Abacus ChatLLM) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Bearer token for the agent API
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Deployed agent identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,

    /// Provider base URL (no trailing path)
    #[serde(default = "default_provider_base_url")]
    pub base_url: String,

    /// Max output tokens per reply
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Outbound call timeout in seconds
    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: f64,
}

impl ProviderConfig {
    /// Outbound call timeout as a `Duration`.
    ///
    /// Values that do not fit a `Duration` fall back to the default.
    pub fn timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout_secs)
            .unwrap_or_else(|_| Duration::from_secs_f64(default_provider_timeout()))
    }

    /// API key and agent id, when both are present and non-blank.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        fn present(v: &Option<String>) -> Option<&str> {
            v.as_deref().filter(|s| !s.trim().is_empty())
        }
        Some((present(&self.api_key)?, present(&self.agent_id)?))
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            agent_id: None,
            base_url: default_provider_base_url(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_provider_timeout(),
        }
    }
}

/// Conversation session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Hours of inactivity before a session is evicted
    #[serde(default = "default_session_ttl_hours")]
    pub ttl_hours: u64,

    /// Message pairs kept per transcript (the transcript holds twice this many entries)
    #[serde(default = "default_max_history")]
    pub max_history: usize,

    /// Name of the session cookie
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,

    /// Cookie lifetime in seconds
    #[serde(default = "default_cookie_max_age")]
    pub cookie_max_age_secs: u64,

    /// Background sweep interval in seconds (0 disables the sweeper)
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl SessionConfig {
    /// Session time-to-live as a `Duration`.
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_hours.saturating_mul(3600))
    }

    /// Maximum number of transcript entries retained.
    pub fn max_entries(&self) -> usize {
        self.max_history.saturating_mul(2)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_hours: default_session_ttl_hours(),
            max_history: default_max_history(),
            cookie_name: default_cookie_name(),
            cookie_max_age_secs: default_cookie_max_age(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

/// Per-client sliding window rate limiting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Enable rate limiting
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Window length in seconds
    #[serde(default = "default_rate_window")]
    pub window_secs: u64,

    /// Requests allowed per window per client
    #[serde(default = "default_rate_limit")]
    pub max_requests: usize,
}

impl RateLimitConfig {
    /// Window length as a `Duration`.
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_secs: default_rate_window(),
            max_requests: default_rate_limit(),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    #[serde(default = "default_bind_address")]
    pub bind: String,

    /// Listening port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Avatar image shown on the chat page
    #[serde(default = "default_image_path")]
    pub image_path: String,

    /// Directory served under `/static`
    #[serde(default = "default_static_dir")]
    pub static_dir: String,

    /// Debug mode (forces debug logging)
    #[serde(default)]
    pub debug: bool,

    /// Maximum accepted request body size
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind_address(),
            port: default_port(),
            image_path: default_image_path(),
            static_dir: default_static_dir(),
            debug: false,
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

// ============================================================================
// Root
// ============================================================================

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Hosted agent settings
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Session store settings
    #[serde(default)]
    pub session: SessionConfig,

    /// Rate limiter settings
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            tracing::info!("Config file not found, using defaults");
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Load configuration with environment variable overrides.
    pub fn load_with_env() -> Result<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable source.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        // Provider
        if let Some(key) = lookup("ABACUS_API_KEY") {
            self.provider.api_key = Some(key);
        }
        if let Some(id) = lookup("ABACUS_AGENT_ID") {
            self.provider.agent_id = Some(id);
        }
        if let Some(url) = lookup("ABACUS_BASE_URL") {
            self.provider.base_url = url;
        }
        override_parsed(&lookup, "ABACUS_MAX_TOKENS", &mut self.provider.max_tokens);
        override_parsed(&lookup, "ABACUS_TEMPERATURE", &mut self.provider.temperature);
        override_parsed(&lookup, "ABACUS_TIMEOUT", &mut self.provider.timeout_secs);

        // Sessions and rate limiting
        override_parsed(&lookup, "SESSION_TTL_HOURS", &mut self.session.ttl_hours);
        override_parsed(&lookup, "MAX_HISTORY", &mut self.session.max_history);
        override_parsed(&lookup, "RATE_WINDOW", &mut self.rate_limit.window_secs);
        override_parsed(&lookup, "RATE_LIMIT", &mut self.rate_limit.max_requests);

        // Server
        override_parsed(&lookup, "PORT", &mut self.server.port);
        if let Some(bind) = lookup("SPARKY_BIND_ADDRESS") {
            self.server.bind = bind;
        }
        if let Some(path) = lookup("SPARKY_IMAGE_PATH") {
            self.server.image_path = path;
        }
        if let Some(dir) = lookup("SPARKY_STATIC_DIR") {
            self.server.static_dir = dir;
        }
        if let Some(debug) = lookup("SPARKY_DEBUG") {
            self.server.debug = matches!(debug.trim(), "1" | "true" | "TRUE" | "yes");
        }

        // Logging
        if let Some(level) = lookup("SPARKY_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Some(format) = lookup("SPARKY_LOG_FORMAT") {
            self.observability.log_format = format;
        }
    }

    /// Log level after applying the debug flag.
    pub fn effective_log_level(&self) -> &str {
        if self.server.debug {
            "debug"
        } else {
            &self.observability.log_level
        }
    }

    /// Check the configuration for values the service cannot run with.
    pub fn validate(&self) -> crate::Result<()> {
        if self.session.max_history == 0 {
            return Err(crate::Error::Config(
                "session.max_history must be at least 1".into(),
            ));
        }
        if self.session.ttl_hours == 0 {
            return Err(crate::Error::Config(
                "session.ttl_hours must be at least 1".into(),
            ));
        }
        if self.rate_limit.enabled {
            if self.rate_limit.window_secs == 0 {
                return Err(crate::Error::Config(
                    "rate_limit.window_secs must be positive when rate limiting is enabled".into(),
                ));
            }
            if self.rate_limit.max_requests == 0 {
                return Err(crate::Error::Config(
                    "rate_limit.max_requests must be positive when rate limiting is enabled"
                        .into(),
                ));
            }
        }
        let timeout_secs = self.provider.timeout_secs;
        if !(timeout_secs > 0.0 && Duration::try_from_secs_f64(timeout_secs).is_ok()) {
            return Err(crate::Error::Config(format!(
                "provider.timeout_secs must be a positive number of seconds, got {timeout_secs}"
            )));
        }
        if !(0.0..=2.0).contains(&self.provider.temperature) {
            return Err(crate::Error::Config(format!(
                "provider.temperature must be within [0, 2], got {}",
                self.provider.temperature
            )));
        }
        Ok(())
    }

    /// Socket address string the server binds to.
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.server.bind, self.server.port)
    }
}

fn override_parsed<F, T>(lookup: &F, key: &str, target: &mut T)
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    if let Some(raw) = lookup(key) {
        match raw.trim().parse() {
            Ok(value) => *target = value,
            Err(_) => tracing::warn!(key = %key, value = %raw, "Ignoring unparseable override"),
        }
    }
}

fn default_provider_base_url() -> String {
    "https://chatllm.abacus.ai".into()
}
fn default_max_tokens() -> u32 {
    500
}
fn default_temperature() -> f64 {
    0.7
}
fn default_provider_timeout() -> f64 {
    10.0
}
fn default_session_ttl_hours() -> u64 {
    72
}
fn default_max_history() -> usize {
    12
}
fn default_cookie_name() -> String {
    "sparky_session".into()
}
fn default_cookie_max_age() -> u64 {
    60 * 60 * 24 * 7
}
fn default_sweep_interval() -> u64 {
    300
}
fn default_rate_window() -> u64 {
    60
}
fn default_rate_limit() -> usize {
    60
}
fn default_bind_address() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    5000
}
fn default_image_path() -> String {
    "/static/beaverr-capcut.jpg".into()
}
fn default_static_dir() -> String {
    "static".into()
}
fn default_max_body_bytes() -> usize {
    64 * 1024
}
fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "pretty".into()
}
fn default_true() -> bool {
    true
}
