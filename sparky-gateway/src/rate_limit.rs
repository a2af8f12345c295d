//! Per-client sliding window rate limiter.
//!
//! Each client keeps the timestamps of its recent admitted requests. A check
//! prunes timestamps older than the window from the front, denies when the
//! remaining count has reached the limit, and otherwise records the request.
//! Denied attempts are not recorded, so a client at the limit is admitted
//! again as soon as its oldest request leaves the window.

use axum::http::HeaderMap;
use sparky_common::config::RateLimitConfig;
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Client id used when neither a forwarded header nor a peer address is known.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// In-memory sliding window rate limiter keyed by client id.
#[derive(Debug)]
pub struct RateLimiter {
    /// Requests allowed per window
    limit: usize,
    /// Trailing window length
    window: Duration,
    /// Disabled limiters admit everything
    enabled: bool,
    /// Admitted request timestamps per client, oldest first
    windows: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimiter {
    /// Create a new rate limiter admitting `limit` requests per `window`.
    pub fn new(limit: usize, window: Duration) -> Self {
        Self {
            limit,
            window,
            enabled: true,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Create a rate limiter from configuration.
    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self {
            enabled: config.enabled,
            ..Self::new(config.max_requests, config.window())
        }
    }

    /// Whether limiting is active.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Check and record a request from `client_id` at the current instant.
    pub fn allow(&self, client_id: &str) -> bool {
        self.allow_at(client_id, Instant::now())
    }

    /// Check and record a request from `client_id` at `now`.
    pub fn allow_at(&self, client_id: &str, now: Instant) -> bool {
        if !self.enabled {
            return true;
        }

        let mut windows = self.lock();
        let timestamps = windows.entry(client_id.to_string()).or_default();

        while let Some(&oldest) = timestamps.front() {
            if now.saturating_duration_since(oldest) > self.window {
                timestamps.pop_front();
            } else {
                break;
            }
        }

        if timestamps.len() >= self.limit {
            tracing::debug!(
                client = %client_id,
                recent = timestamps.len(),
                limit = self.limit,
                "Rate limit reached"
            );
            return false;
        }

        timestamps.push_back(now);
        true
    }

    /// Drop clients with no admitted request inside the window.
    ///
    /// Returns the number of clients removed.
    pub fn sweep_idle(&self, now: Instant) -> usize {
        let mut windows = self.lock();
        let before = windows.len();
        windows.retain(|_, timestamps| {
            timestamps
                .back()
                .is_some_and(|&newest| now.saturating_duration_since(newest) <= self.window)
        });
        before - windows.len()
    }

    /// Number of clients currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.lock().len()
    }

    /// Number of recorded requests for a client (without pruning).
    pub fn recent_requests(&self, client_id: &str) -> usize {
        self.lock().get(client_id).map_or(0, VecDeque::len)
    }

    // A panic while holding the lock cannot leave a window half-updated in a
    // way that breaks the invariants, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, VecDeque<Instant>>> {
        self.windows.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Derive the client id for rate limiting.
///
/// Uses the first entry of `X-Forwarded-For` when present, then the peer
/// address, then [`UNKNOWN_CLIENT`].
pub fn client_id_from_headers(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let forwarded = headers
        .get("X-Forwarded-For")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    match (forwarded, peer) {
        (Some(ip), _) => ip.to_string(),
        (None, Some(addr)) => addr.ip().to_string(),
        (None, None) => UNKNOWN_CLIENT.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(60);

    #[test]
    fn test_denies_after_limit_within_window() {
        let limiter = RateLimiter::new(3, WINDOW);
        let start = Instant::now();

        for i in 0..3 {
            assert!(limiter.allow_at("10.0.0.1", start + Duration::from_secs(i)));
        }
        assert!(!limiter.allow_at("10.0.0.1", start + Duration::from_secs(10)));
        // Denied attempts are not recorded
        assert_eq!(limiter.recent_requests("10.0.0.1"), 3);
    }

    #[test]
    fn test_allows_again_after_oldest_leaves_window() {
        let limiter = RateLimiter::new(2, WINDOW);
        let start = Instant::now();

        assert!(limiter.allow_at("c", start));
        assert!(limiter.allow_at("c", start + Duration::from_secs(30)));
        assert!(!limiter.allow_at("c", start + Duration::from_secs(59)));

        // Exactly at the window edge the oldest request still counts
        assert!(!limiter.allow_at("c", start + WINDOW));

        let later = start + WINDOW + Duration::from_millis(1);
        assert!(limiter.allow_at("c", later));
        assert!(!limiter.allow_at("c", later));
    }

    #[test]
    fn test_sixty_first_request_denied() {
        let limiter = RateLimiter::new(60, WINDOW);
        let start = Instant::now();

        for i in 0..60 {
            assert!(limiter.allow_at("1.2.3.4", start + Duration::from_millis(i * 500)));
        }
        assert!(!limiter.allow_at("1.2.3.4", start + Duration::from_secs(45)));
    }

    #[test]
    fn test_clients_are_independent() {
        let limiter = RateLimiter::new(1, WINDOW);
        let now = Instant::now();

        assert!(limiter.allow_at("a", now));
        assert!(!limiter.allow_at("a", now));
        assert!(limiter.allow_at("b", now));
        assert_eq!(limiter.tracked_clients(), 2);
    }

    #[test]
    fn test_disabled_limiter_always_allows() {
        let limiter = RateLimiter::from_config(&RateLimitConfig {
            enabled: false,
            window_secs: 60,
            max_requests: 1,
        });
        assert!(!limiter.is_enabled());
        for _ in 0..10 {
            assert!(limiter.allow("a"));
        }
        assert_eq!(limiter.tracked_clients(), 0);
    }

    #[test]
    fn test_sweep_idle_removes_quiet_clients() {
        let limiter = RateLimiter::new(5, WINDOW);
        let start = Instant::now();

        assert!(limiter.allow_at("quiet", start));
        assert!(limiter.allow_at("busy", start + Duration::from_secs(50)));

        let removed = limiter.sweep_idle(start + Duration::from_secs(90));
        assert_eq!(removed, 1);
        assert_eq!(limiter.tracked_clients(), 1);
        assert_eq!(limiter.recent_requests("quiet"), 0);
        assert_eq!(limiter.recent_requests("busy"), 1);
    }

    #[test]
    fn test_client_id_prefers_forwarded_header() {
        let mut headers = HeaderMap::new();
        headers.insert("X-Forwarded-For", " 203.0.113.7 , 10.0.0.1".parse().unwrap());
        let peer: SocketAddr = "127.0.0.1:4000".parse().unwrap();

        assert_eq!(client_id_from_headers(&headers, Some(peer)), "203.0.113.7");
    }

    #[test]
    fn test_client_id_falls_back_to_peer_then_unknown() {
        let peer: SocketAddr = "192.168.1.5:5555".parse().unwrap();
        assert_eq!(
            client_id_from_headers(&HeaderMap::new(), Some(peer)),
            "192.168.1.5"
        );

        let mut headers = HeaderMap::new();
        headers.insert("X-Forwarded-For", "".parse().unwrap());
        assert_eq!(client_id_from_headers(&headers, None), UNKNOWN_CLIENT);
    }
}
