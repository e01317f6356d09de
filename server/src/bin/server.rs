//! Edumarket Server
//!
//! Runs the marketplace HTTP API.
//!
//! This binary:
//! - Connects to `PostgreSQL` and applies migrations
//! - Connects to Redis for sessions and magic-link tokens
//! - Serves the API and the Prometheus metrics endpoint
//!
//! # Usage
//!
//! ```bash
//! # Start infrastructure
//! docker compose up -d
//!
//! # Run server
//! cargo run --bin server
//! ```

use edumarket_server::{Config, EdumarketApp};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,edumarket=debug,edumarket_server=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Edumarket server...");

    let config = Config::from_env();
    tracing::info!(
        http = %config.http_addr(),
        metrics = %config.metrics_addr(),
        commission_bps = config.marketplace.commission_bps,
        "Configuration loaded"
    );

    let app = EdumarketApp::new(config).await?;
    tracing::info!("Application initialized");

    app.serve().await
}
