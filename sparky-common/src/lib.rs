//! Sparky Common - Shared configuration, errors, and logging for the Sparky chat service.
//!
//! This crate provides:
//! - Configuration types, loading, and environment overrides
//! - Error types and handling utilities
//! - Logging setup and request tracing helpers

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod logging;

pub use config::{
    Config, ObservabilityConfig, ProviderConfig, RateLimitConfig, ServerConfig, SessionConfig,
};
pub use error::{Error, Result};

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Error, Result, ResultExt};
    pub use crate::logging::{init_logging, RequestContext};
}
