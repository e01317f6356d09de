//! Payment gateway integration.
//!
//! The marketplace never handles card data: it asks the gateway for a
//! hosted checkout page, sends the buyer there, and learns the outcome from
//! a signed webhook (see [`signature`]).
//!
//! - [`HttpPaymentGateway`]: a gateway reached over its JSON API
//! - [`MockPaymentGateway`]: hands out fake checkout URLs for development
//!   and tests

mod http;
mod mock;
pub mod signature;

pub use http::HttpPaymentGateway;
pub use mock::MockPaymentGateway;

use async_trait::async_trait;
use edumarket_core::PaymentId;
use edumarket_web::AppError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Payment gateway result
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Payment gateway failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    /// Gateway could not be reached or answered with a server error.
    #[error("payment gateway unavailable: {0}")]
    Unavailable(String),
    /// Gateway refused the request.
    #[error("payment gateway rejected the request ({status}): {message}")]
    Rejected {
        /// HTTP status returned by the gateway
        status: u16,
        /// Gateway message
        message: String,
    },
    /// Gateway answered with something we could not read.
    #[error("invalid payment gateway response: {0}")]
    InvalidResponse(String),
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        Self::unavailable("The payment gateway is unavailable, please try again later")
            .with_source(anyhow::Error::new(err))
    }
}

/// What the buyer is asked to pay for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutSessionRequest {
    /// Our payment id, echoed back in the webhook
    pub payment_id: PaymentId,
    /// Amount to capture
    pub amount_cents: u64,
    /// Line shown on the hosted page
    pub description: String,
    /// Payer email, prefilled on the hosted page
    pub customer_email: String,
    /// Redirect after success
    pub success_url: String,
    /// Redirect after cancel
    pub cancel_url: String,
}

/// A hosted checkout page created by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// Gateway-side session id
    pub gateway_reference: String,
    /// Page to redirect the buyer to
    pub checkout_url: String,
}

/// Payment gateway trait
///
/// Abstraction over hosted-checkout processors.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a hosted checkout page for `request`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] if the gateway is unreachable or refuses.
    async fn create_checkout_session(&self, request: CheckoutSessionRequest) -> GatewayResult<CheckoutSession>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_gateway_errors_map_to_service_unavailable() {
        let err: AppError = GatewayError::Unavailable("connection refused".into()).into();
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);

        let err: AppError = GatewayError::Rejected {
            status: 400,
            message: "bad currency".into(),
        }
        .into();
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(!err.message().contains("bad currency"));
    }
}
