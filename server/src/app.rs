//! Application bootstrap and lifecycle.
//!
//! [`EdumarketApp::new`] wires every dependency from [`Config`]:
//!
//! 1. `PostgreSQL` pool and migrations
//! 2. Redis stores for magic-link tokens, sessions and rate limits
//! 3. Email provider (SMTP, or the console in development)
//! 4. Payment gateway (HTTP, or the mock when no URL is configured)
//! 5. The admin account named by `ADMIN_EMAIL`
//!
//! [`EdumarketApp::serve`] then runs the HTTP server until Ctrl+C or
//! SIGTERM. In-flight requests get `SHUTDOWN_TIMEOUT` seconds to finish.

use crate::config::Config;
use crate::payment_gateway::{HttpPaymentGateway, MockPaymentGateway, PaymentGateway};
use crate::server::{AppState, CheckoutSettings, build_router};
use anyhow::Context;
use axum::Router;
use axum::http::HeaderValue;
use edumarket_auth::MagicLinks;
use edumarket_auth::providers::{ConsoleEmailProvider, EmailProvider, SmtpEmailProvider};
use edumarket_auth::stores::{self, RedisRateLimiter, RedisSessionStore, RedisTokenStore};
use edumarket_core::environment::{Clock, SystemClock};
use edumarket_core::repository::UserRepository;
use edumarket_postgres::PgMarketplace;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{info, warn};

const GATEWAY_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const ADMIN_NAME: &str = "Administrator";

/// The wired-up marketplace.
pub struct EdumarketApp {
    config: Config,
    state: AppState,
}

impl EdumarketApp {
    /// Connect to every backing service and build the shared state.
    ///
    /// # Errors
    ///
    /// Returns error if `PostgreSQL` or Redis is unreachable, a migration
    /// fails, or the email or gateway settings are invalid.
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store = Arc::new(
            PgMarketplace::connect(&config.postgres.pool_settings())
                .await
                .context("connecting to PostgreSQL")?,
        );
        store.migrate().await.context("running migrations")?;

        let redis = stores::connect(&config.redis.url).await.context("connecting to Redis")?;
        let auth = MagicLinks::new(
            config.auth.magic_links(),
            Arc::new(RedisTokenStore::new(redis.clone())),
            Arc::new(RedisSessionStore::new(redis.clone())),
            Arc::new(RedisRateLimiter::new(redis)),
            email_provider(&config)?,
        );
        if config.auth.expose_magic_links_for_testing {
            warn!("Magic links are returned in API responses; never enable this in production");
        }

        let gateway = payment_gateway(&config)?;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        if let Some(email) = &config.auth.admin_email {
            let admin = store
                .ensure_admin(email, ADMIN_NAME, clock.now())
                .await
                .context("creating the admin account")?;
            info!(user_id = %admin.id, email = %admin.email, "Admin account ready");
        }

        let state = AppState::new(
            store,
            auth,
            gateway,
            clock,
            config.marketplace,
            CheckoutSettings::from(&config.gateway),
        );
        Ok(Self { config, state })
    }

    /// Shared handler state.
    #[must_use]
    pub const fn state(&self) -> &AppState {
        &self.state
    }

    /// Router with CORS applied.
    #[must_use]
    pub fn router(&self) -> Router {
        build_router(self.state.clone()).layer(cors_layer(&self.config.server.cors_allowed_origins))
    }

    /// Run the Prometheus exporter and the HTTP server until shutdown.
    ///
    /// # Errors
    ///
    /// Returns error if either listener cannot bind.
    pub async fn serve(self) -> anyhow::Result<()> {
        let metrics_addr: SocketAddr = self
            .config
            .metrics_addr()
            .parse()
            .context("parsing the metrics address")?;
        PrometheusBuilder::new()
            .with_http_listener(metrics_addr)
            .install()
            .context("installing the Prometheus exporter")?;
        crate::metrics::register_business_metrics();
        info!(address = %metrics_addr, "Metrics exporter listening");

        let addr = self.config.http_addr();
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("binding {addr}"))?;
        info!(address = %addr, "HTTP server listening for requests");

        let (stopping_tx, stopping_rx) = watch::channel(false);
        let server = axum::serve(listener, self.router()).with_graceful_shutdown(async move {
            shutdown_signal().await;
            let _ = stopping_tx.send(true);
        });

        let grace = Duration::from_secs(self.config.server.shutdown_timeout);
        tokio::select! {
            result = server.into_future() => result.context("HTTP server failed")?,
            () = drain_deadline(stopping_rx, grace) => {
                warn!(timeout_secs = grace.as_secs(), "Shutdown timed out; dropping open connections");
            }
        }

        info!("Graceful shutdown complete");
        Ok(())
    }
}

fn email_provider(config: &Config) -> anyhow::Result<Arc<dyn EmailProvider>> {
    let email = &config.email;
    let Some(host) = &email.smtp_host else {
        info!("SMTP not configured; emails are logged to the console");
        return Ok(Arc::new(ConsoleEmailProvider::new()));
    };

    let credentials = email.smtp_username.clone().zip(email.smtp_password.clone());
    let provider = SmtpEmailProvider::new(host, email.smtp_port, credentials, &email.from, &email.from_name)
        .context("configuring SMTP")?;
    info!(host = %host, port = email.smtp_port, "SMTP email provider configured");
    Ok(Arc::new(provider))
}

fn payment_gateway(config: &Config) -> anyhow::Result<Arc<dyn PaymentGateway>> {
    config.gateway.validate()?;
    let Some(url) = &config.gateway.url else {
        warn!("PAYMENT_GATEWAY_URL not set; using the mock payment gateway");
        let base = format!("http://{}/mock-checkout", config.http_addr());
        return Ok(Arc::new(MockPaymentGateway::new(base)));
    };

    let gateway = HttpPaymentGateway::new(url, config.gateway.api_key.clone(), GATEWAY_REQUEST_TIMEOUT)
        .context("configuring the payment gateway client")?;
    info!(url = %url, "Payment gateway configured");
    Ok(Arc::new(gateway))
}

/// CORS for the configured origins; any origin when the list is empty.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    let allow_origin = if allowed.is_empty() {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(allowed)
    };
    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Resolves `grace` after shutdown starts; never resolves before.
async fn drain_deadline(mut stopping: watch::Receiver<bool>, grace: Duration) {
    if stopping.wait_for(|stopping| *stopping).await.is_err() {
        std::future::pending::<()>().await;
    }
    tokio::time::sleep(grace).await;
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(error = %err, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        () = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cors_layer_skips_invalid_origins() {
        // Builds without panicking for a mix of valid and invalid values
        let _layer = cors_layer(&["https://edumarket.example".to_string(), "bad\norigin".to_string()]);
        let _any = cors_layer(&[]);
    }

    #[tokio::test]
    async fn test_drain_deadline_waits_for_shutdown() {
        let (tx, rx) = watch::channel(false);
        let deadline = drain_deadline(rx, Duration::from_millis(10));
        tokio::pin!(deadline);

        let early = tokio::time::timeout(Duration::from_millis(30), &mut deadline).await;
        assert!(early.is_err());

        let _ = tx.send(true);
        let finished = tokio::time::timeout(Duration::from_millis(500), &mut deadline).await;
        assert!(finished.is_ok());
    }
}
