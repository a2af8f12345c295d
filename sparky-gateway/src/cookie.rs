//! Session cookie reading and writing.
//!
//! Session ids travel as a bare, unsigned cookie value.

use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue};

/// Find the value of cookie `name` across all `Cookie` headers.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim().trim_matches('"').to_string())
        .filter(|value| !value.is_empty())
}

/// Build a `Set-Cookie` value for the session id.
///
/// Returns `None` if the id cannot be carried in a header.
pub fn session_cookie(name: &str, session_id: &str, max_age_secs: u64) -> Option<HeaderValue> {
    if session_id.is_empty()
        || !session_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return None;
    }

    HeaderValue::from_str(&format!(
        "{name}={session_id}; Max-Age={max_age_secs}; Path=/; HttpOnly; SameSite=Lax"
    ))
    .ok()
}

/// Append the session cookie to `headers` when the id is usable.
pub fn set_session_cookie(headers: &mut HeaderMap, name: &str, session_id: &str, max_age_secs: u64) {
    match session_cookie(name, session_id, max_age_secs) {
        Some(value) => {
            headers.append(SET_COOKIE, value);
        }
        None => tracing::debug!("Skipping session cookie with unusable id"),
    }
}
