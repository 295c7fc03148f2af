//! Storefront API - Main Application Entry Point
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment variables
//! 2. Connect to the document database
//! 3. Build the payment client
//! 4. Build HTTP routes and the middleware pipeline
//! 5. Start server on configured port
//!
//! Any startup failure is logged and the process exits non-zero.

use storefront_api::{config::Config, server};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging with tracing subscriber. Reads RUST_LOG environment variable (defaults to "info" level)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "Configuration rejected");
            return Err(err.into());
        }
    };
    tracing::info!(port = config.port, "Configuration loaded");

    if let Err(err) = server::run(config).await {
        tracing::error!(error = %err, "Server exited with error");
        return Err(err);
    }

    Ok(())
}
