//! Application state for the marketplace HTTP server.
//!
//! Contains all shared resources needed by HTTP handlers:
//! - Repositories (one handle per concern, all backed by the same store)
//! - Magic-link authentication
//! - Payment gateway
//! - Clock and marketplace settings

use crate::config::{GatewayConfig, MarketplaceConfig};
use crate::payment_gateway::PaymentGateway;
use crate::server::health::DatabaseCheck;
use edumarket_auth::MagicLinks;
use edumarket_core::environment::Clock;
use edumarket_core::repository::{
    CartRepository, CatalogRepository, CommerceRepository, EngagementRepository, ReportRepository,
    UserRepository,
};
use edumarket_web::ReadinessCheck;
use std::sync::Arc;

/// Webhook secret and redirect targets handed to the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSettings {
    /// Shared secret for webhook signatures
    pub webhook_secret: String,
    /// Redirect after a successful payment
    pub success_url: String,
    /// Redirect after a cancelled payment
    pub cancel_url: String,
}

impl From<&GatewayConfig> for CheckoutSettings {
    fn from(config: &GatewayConfig) -> Self {
        Self {
            webhook_secret: config.webhook_secret.clone(),
            success_url: config.success_url.clone(),
            cancel_url: config.cancel_url.clone(),
        }
    }
}

/// Application state shared across all HTTP handlers.
///
/// It's cloned (cheaply via Arc) for each request.
#[derive(Clone)]
pub struct AppState {
    /// Accounts and guardian links
    pub users: Arc<dyn UserRepository>,
    /// Content and quiz questions
    pub catalog: Arc<dyn CatalogRepository>,
    /// Shopping carts
    pub cart: Arc<dyn CartRepository>,
    /// Orders, payments, wallets and withdrawals
    pub commerce: Arc<dyn CommerceRepository>,
    /// Reviews, comments and quiz attempts
    pub engagement: Arc<dyn EngagementRepository>,
    /// Admin aggregates
    pub reports: Arc<dyn ReportRepository>,
    /// Passwordless login
    pub auth: MagicLinks,
    /// Hosted checkout provider
    pub gateway: Arc<dyn PaymentGateway>,
    /// Time source
    pub clock: Arc<dyn Clock>,
    /// Commission and money limits
    pub market: MarketplaceConfig,
    /// Webhook secret and redirect URLs
    pub checkout: CheckoutSettings,
    /// Probes run by `/ready`
    pub readiness: Vec<Arc<dyn ReadinessCheck>>,
}

impl AppState {
    /// Create the state over one store implementing every repository.
    #[must_use]
    pub fn new<S>(
        store: Arc<S>,
        auth: MagicLinks,
        gateway: Arc<dyn PaymentGateway>,
        clock: Arc<dyn Clock>,
        market: MarketplaceConfig,
        checkout: CheckoutSettings,
    ) -> Self
    where
        S: UserRepository
            + CatalogRepository
            + CartRepository
            + CommerceRepository
            + EngagementRepository
            + ReportRepository
            + 'static,
    {
        let reports: Arc<dyn ReportRepository> = store.clone();
        let readiness: Vec<Arc<dyn ReadinessCheck>> = vec![Arc::new(DatabaseCheck::new(Arc::clone(&reports)))];
        Self {
            users: store.clone(),
            catalog: store.clone(),
            cart: store.clone(),
            commerce: store.clone(),
            engagement: store,
            reports,
            auth,
            gateway,
            clock,
            market,
            checkout,
            readiness,
        }
    }

    /// Current time from the injected clock.
    #[must_use]
    pub fn now(&self) -> chrono::DateTime<chrono::Utc> {
        self.clock.now()
    }
}
