//! Mock payment gateway for development and testing.

use super::{CheckoutSession, CheckoutSessionRequest, GatewayError, GatewayResult, PaymentGateway};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Mock payment gateway
///
/// Always creates a session (unless switched offline) and remembers every
/// request so tests can inspect what would have been charged. Payments
/// only complete when something posts the matching webhook.
#[derive(Debug, Clone)]
pub struct MockPaymentGateway {
    checkout_base: String,
    sessions: Arc<Mutex<Vec<CheckoutSessionRequest>>>,
    offline: Arc<AtomicBool>,
}

impl MockPaymentGateway {
    /// Creates a mock gateway whose checkout URLs start with `checkout_base`.
    #[must_use]
    pub fn new(checkout_base: impl Into<String>) -> Self {
        Self {
            checkout_base: checkout_base.into().trim_end_matches('/').to_string(),
            sessions: Arc::new(Mutex::new(Vec::new())),
            offline: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Make every following call fail as if the gateway were down.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Checkout requests received so far.
    #[must_use]
    pub fn sessions(&self) -> Vec<CheckoutSessionRequest> {
        self.sessions.lock().map(|s| s.clone()).unwrap_or_default()
    }

    fn ensure_online(&self) -> GatewayResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            Err(GatewayError::Unavailable("mock gateway is offline".into()))
        } else {
            Ok(())
        }
    }
}

impl Default for MockPaymentGateway {
    fn default() -> Self {
        Self::new("http://localhost:8080/mock-checkout")
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn create_checkout_session(&self, request: CheckoutSessionRequest) -> GatewayResult<CheckoutSession> {
        self.ensure_online()?;
        let gateway_reference = format!("mock_cs_{}", uuid::Uuid::new_v4().simple());
        let checkout_url = format!("{}/{gateway_reference}", self.checkout_base);

        tracing::info!(
            payment_id = %request.payment_id,
            amount_cents = request.amount_cents,
            gateway_reference = %gateway_reference,
            "Mock checkout session created"
        );
        self.sessions
            .lock()
            .map_err(|_| GatewayError::Unavailable("mock gateway lock poisoned".into()))?
            .push(request);

        Ok(CheckoutSession {
            gateway_reference,
            checkout_url,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use edumarket_core::PaymentId;

    fn request() -> CheckoutSessionRequest {
        CheckoutSessionRequest {
            payment_id: PaymentId::new(),
            amount_cents: 4_900,
            description: "Compilers".into(),
            customer_email: "ada@example.com".into(),
            success_url: "http://localhost/success".into(),
            cancel_url: "http://localhost/cancel".into(),
        }
    }

    #[tokio::test]
    async fn test_mock_session_is_recorded() {
        let gateway = MockPaymentGateway::new("https://pay.test/");
        let session = gateway.create_checkout_session(request()).await.unwrap();

        assert!(session.gateway_reference.starts_with("mock_cs_"));
        assert_eq!(session.checkout_url, format!("https://pay.test/{}", session.gateway_reference));
        assert_eq!(gateway.sessions().len(), 1);
        assert_eq!(gateway.sessions()[0].amount_cents, 4_900);
    }

    #[tokio::test]
    async fn test_offline_mock_fails() {
        let gateway = MockPaymentGateway::default();
        gateway.set_offline(true);
        assert!(matches!(
            gateway.create_checkout_session(request()).await,
            Err(GatewayError::Unavailable(_))
        ));

        gateway.set_offline(false);
        assert!(gateway.create_checkout_session(request()).await.is_ok());
    }
}
