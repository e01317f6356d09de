//! Gateway reached over its JSON API.

use super::{CheckoutSession, CheckoutSessionRequest, GatewayError, GatewayResult, PaymentGateway};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Hosted-checkout gateway over HTTPS.
///
/// ```text
/// POST {base_url}/v1/checkout/sessions  -> {"id", "url"}
/// ```
///
/// Requests carry `Authorization: Bearer <api_key>`.
#[derive(Debug, Clone)]
pub struct HttpPaymentGateway {
    base_url: String,
    api_key: String,
    client: Client,
}

#[derive(Debug, Serialize)]
struct SessionBody<'a> {
    client_reference_id: String,
    amount_cents: u64,
    description: &'a str,
    customer_email: &'a str,
    success_url: &'a str,
    cancel_url: &'a str,
}

#[derive(Debug, Deserialize)]
struct SessionReply {
    id: String,
    url: String,
}

impl HttpPaymentGateway {
    /// Build a gateway client.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Unavailable`] when the HTTP client cannot be
    /// built.
    pub fn new(base_url: &str, api_key: impl Into<String>, request_timeout: Duration) -> GatewayResult<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(request_timeout)
            .build()
            .map_err(|err| GatewayError::Unavailable(err.to_string()))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        })
    }

    async fn post<B: Serialize + Sync>(&self, path: &str, body: &B) -> GatewayResult<Response> {
        let response = self
            .client
            .post(format!("{}{path}", self.base_url))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|err| GatewayError::Unavailable(err.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            Err(GatewayError::Unavailable(format!("status {status}")))
        } else {
            Err(GatewayError::Rejected {
                status: status.as_u16(),
                message,
            })
        }
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn create_checkout_session(&self, request: CheckoutSessionRequest) -> GatewayResult<CheckoutSession> {
        let body = SessionBody {
            client_reference_id: request.payment_id.to_string(),
            amount_cents: request.amount_cents,
            description: &request.description,
            customer_email: &request.customer_email,
            success_url: &request.success_url,
            cancel_url: &request.cancel_url,
        };
        let reply: SessionReply = self
            .post("/v1/checkout/sessions", &body)
            .await?
            .json()
            .await
            .map_err(|err| GatewayError::InvalidResponse(err.to_string()))?;

        tracing::info!(
            payment_id = %request.payment_id,
            gateway_reference = %reply.id,
            amount_cents = request.amount_cents,
            "Checkout session created"
        );
        Ok(CheckoutSession {
            gateway_reference: reply.id,
            checkout_url: reply.url,
        })
    }
}
