//! Logging utilities for the Sparky service.
//!
//! Provides pretty or structured JSON logging plus trace IDs that follow a
//! chat request from the HTTP surface into the outbound provider call.
//!
//! # Noise Filtering
//!
//! Noisy library modules (hyper, reqwest, h2, rustls, tower_http) are set to
//! `warn` so connection-level chatter does not drown out chat-flow logs.

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Header used to propagate the trace ID.
pub const TRACE_ID_HEADER: &str = "X-Trace-Id";

/// Header used to propagate the span ID.
pub const SPAN_ID_HEADER: &str = "X-Span-Id";

/// Default noisy modules that should be filtered to warn level.
pub const NOISY_MODULES: &[&str] = &[
    "hyper",
    "hyper_util",
    "reqwest",
    "h2",
    "rustls",
    "tower_http",
    "handlebars",
];

/// Build the filter directives for a base level with noise suppression.
fn filter_directives(log_level: &str) -> String {
    let mut directives = String::from(log_level);
    for module in NOISY_MODULES {
        directives.push_str(&format!(",{}=warn", module));
    }
    directives
}

/// Build the default EnvFilter. `RUST_LOG` wins when it is set.
fn build_filter(log_level: &str) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }

    EnvFilter::new(filter_directives(log_level))
}

/// Initialize logging with the given configuration.
///
/// # Arguments
///
/// * `log_level` - Base log level (trace, debug, info, warn, error)
/// * `log_format` - Output format: "json" for structured JSON, anything else for human-readable
///
/// Calling this more than once is harmless; later calls leave the first
/// subscriber in place.
pub fn init_logging(log_level: &str, log_format: &str) {
    let filter = build_filter(log_level);

    let subscriber = tracing_subscriber::registry().with(filter);

    if log_format == "json" {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_span_events(FmtSpan::CLOSE)
            .with_current_span(true)
            .with_target(true)
            .with_file(true)
            .with_line_number(true);
        let _ = subscriber.with(fmt_layer).try_init();
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_ansi(true)
            .with_target(true)
            .with_file(false)
            .with_line_number(false);
        let _ = subscriber.with(fmt_layer).try_init();
    }

    tracing::info!(
        log_level = %log_level,
        log_format = %log_format,
        noise_filtered = NOISY_MODULES.len(),
        "Logging initialized"
    );
}

/// Generate a new trace ID for request tracing.
pub fn generate_trace_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Generate a new span ID for step tracing.
pub fn generate_span_id() -> String {
    uuid::Uuid::new_v4().to_string()[..8].to_string()
}

// ============================================================================
// Request Context
// ============================================================================

/// Request context for tracing a single chat request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Unique trace ID for the request chain
    pub trace_id: String,
    /// Current span ID
    pub span_id: String,
    /// Parent span ID (if the caller sent one)
    pub parent_span_id: Option<String>,
    /// Service name
    pub service: String,
}

impl RequestContext {
    /// Create a new request context.
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            trace_id: generate_trace_id(),
            span_id: generate_span_id(),
            parent_span_id: None,
            service: service.into(),
        }
    }

    /// Create context from HTTP headers, reusing an inbound trace ID when present.
    pub fn from_headers(headers: &http::HeaderMap, service: impl Into<String>) -> Self {
        let trace_id = headers
            .get(TRACE_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(String::from)
            .unwrap_or_else(generate_trace_id);

        let parent_span_id = headers
            .get(SPAN_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        Self {
            trace_id,
            span_id: generate_span_id(),
            parent_span_id,
            service: service.into(),
        }
    }

    /// Add context to HTTP headers for propagation.
    pub fn to_headers(&self, headers: &mut http::HeaderMap) {
        if let Ok(trace_id) = self.trace_id.parse() {
            headers.insert(TRACE_ID_HEADER, trace_id);
        }
        if let Ok(span_id) = self.span_id.parse() {
            headers.insert(SPAN_ID_HEADER, span_id);
        }
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new("unknown")
    }
}

/// Create a tracing span for a request with business context.
///
/// # Example
///
/// ```ignore
/// let span = request_span!("chat", ctx.trace_id, client = %client_id);
/// async { /* ... */ }.instrument(span).await;
/// ```
#[macro_export]
macro_rules! request_span {
    ($name:expr, $trace_id:expr) => {
        tracing::info_span!($name, trace_id = %$trace_id)
    };
    ($name:expr, $trace_id:expr, $($field:tt)*) => {
        tracing::info_span!($name, trace_id = %$trace_id, $($field)*)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noisy_modules_list() {
        assert!(NOISY_MODULES.contains(&"hyper"));
        assert!(NOISY_MODULES.contains(&"reqwest"));
        assert!(NOISY_MODULES.contains(&"tower_http"));
    }

    #[test]
    fn test_filter_directives() {
        let directives = filter_directives("debug");
        assert!(directives.starts_with("debug,"));
        assert!(directives.contains("reqwest=warn"));
        assert!(directives.contains("hyper=warn"));
    }

    #[test]
    fn test_generate_trace_id() {
        let id1 = generate_trace_id();
        let id2 = generate_trace_id();
        assert_ne!(id1, id2);
        assert_eq!(id1.len(), 36);
    }

    #[test]
    fn test_generate_span_id() {
        assert_eq!(generate_span_id().len(), 8);
    }

    #[test]
    fn test_request_context_from_headers_reuses_trace_id() {
        let mut headers = http::HeaderMap::new();
        headers.insert(TRACE_ID_HEADER, "trace-abc".parse().unwrap());
        headers.insert(SPAN_ID_HEADER, "span0001".parse().unwrap());

        let ctx = RequestContext::from_headers(&headers, "sparky-gateway");
        assert_eq!(ctx.trace_id, "trace-abc");
        assert_eq!(ctx.parent_span_id.as_deref(), Some("span0001"));
        assert_ne!(ctx.span_id, "span0001");
        assert_eq!(ctx.service, "sparky-gateway");
    }

    #[test]
    fn test_request_context_from_empty_headers() {
        let ctx = RequestContext::from_headers(&http::HeaderMap::new(), "sparky-gateway");
        assert_eq!(ctx.trace_id.len(), 36);
        assert!(ctx.parent_span_id.is_none());
    }

    #[test]
    fn test_request_context_to_headers() {
        let ctx = RequestContext::new("sparky-gateway");
        let mut headers = http::HeaderMap::new();
        ctx.to_headers(&mut headers);

        assert_eq!(
            headers.get(TRACE_ID_HEADER).unwrap().to_str().unwrap(),
            ctx.trace_id
        );
        assert_eq!(
            headers.get(SPAN_ID_HEADER).unwrap().to_str().unwrap(),
            ctx.span_id
        );
    }
}
