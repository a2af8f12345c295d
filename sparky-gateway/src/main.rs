//! Sparky Gateway - Main entry point.

use anyhow::Result;
use sparky_common::config::Config;
use sparky_common::logging::init_logging;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::load_with_env()?;
    config.validate()?;

    // Initialize logging
    init_logging(config.effective_log_level(), &config.observability.log_format);

    tracing::info!("Sparky Gateway v{}", env!("CARGO_PKG_VERSION"));
    tracing::debug!(
        max_history = config.session.max_history,
        ttl_hours = config.session.ttl_hours,
        rate_limit = config.rate_limit.max_requests,
        rate_window_secs = config.rate_limit.window_secs,
        "Loaded configuration"
    );

    // Start the gateway server
    sparky_gateway::start_server(config).await
}
