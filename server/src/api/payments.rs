//! Gateway payments and the payment webhook.
//!
//! - POST /api/payments/webhook - Signed gateway callback
//! - GET /api/payments/:id - One payment (payer/admin)
//! - GET /api/payments - The caller's payments
//!
//! # Flow
//!
//! ```text
//! checkout / top-up → Pending payment → hosted checkout page
//!                                         │
//!            payment.succeeded webhook ←──┘──→ payment.failed webhook
//!                     │                             │
//!   credit wallet, fulfill snapshot            mark Failed
//! ```
//!
//! Webhooks are deduplicated on `event_id`; a payment leaves `Pending`
//! exactly once.

use crate::auth::CurrentUser;
use crate::metrics;
use crate::payment_gateway::CheckoutSessionRequest;
use crate::payment_gateway::signature::{self, SIGNATURE_HEADER};
use crate::server::state::AppState;
use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::HeaderMap,
};
use edumarket_core::model::{
    CheckoutLine, FulfillmentOutcome, NewPayment, Payment, PaymentConfirmation, User,
};
use edumarket_core::{Money, Page, PageRequest, PaymentId, PaymentPurpose, PaymentStatus, UserId};
use edumarket_web::{AppError, CorrelationId, WebResult};
use serde::{Deserialize, Serialize};

/// Event type of a captured payment.
pub const PAYMENT_SUCCEEDED: &str = "payment.succeeded";
/// Event type of a declined or abandoned payment.
pub const PAYMENT_FAILED: &str = "payment.failed";

/// Where to send the buyer next.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentStarted {
    /// Pending payment id
    pub payment_id: PaymentId,
    /// Hosted checkout page
    pub checkout_url: String,
    /// Amount to pay
    pub amount: Money,
}

/// Webhook body sent by the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    /// Unique per delivery attempt group; replays reuse it
    pub event_id: String,
    /// `payment.succeeded`, `payment.failed`, ...
    pub event_type: String,
    /// Our payment id
    pub payment_id: PaymentId,
    /// Gateway session id
    pub gateway_reference: String,
    /// Captured amount
    pub amount_cents: u64,
    /// Decline reason for failures
    #[serde(default)]
    pub failure_reason: Option<String>,
}

/// Webhook acknowledgement.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum WebhookReply {
    /// Result of a `payment.succeeded` event
    Confirmation(FulfillmentOutcome),
    /// Result of a `payment.failed` event
    Failure {
        /// Always `"failed"`
        outcome: &'static str,
        /// The payment as stored
        payment: Payment,
    },
    /// Event type we do not handle
    Ignored {
        /// Always `"ignored"`
        outcome: &'static str,
        /// The unhandled type
        event_type: String,
    },
}

/// Store a pending payment and open a hosted checkout page for it.
///
/// If the gateway cannot be reached the payment is marked failed so it
/// never lingers as pending.
pub(crate) async fn start_gateway_payment(
    state: &AppState,
    payer: &User,
    beneficiary_id: UserId,
    purpose: PaymentPurpose,
    amount: Money,
    lines: Vec<CheckoutLine>,
    description: String,
) -> WebResult<PaymentStarted> {
    let now = state.now();
    let payment = state
        .commerce
        .create_payment(
            NewPayment {
                user_id: payer.id,
                beneficiary_id,
                purpose,
                amount,
                lines,
                commission_bps: state.market.commission_bps,
            },
            now,
        )
        .await?;

    let request = CheckoutSessionRequest {
        payment_id: payment.id,
        amount_cents: amount.cents(),
        description,
        customer_email: payer.email.clone(),
        success_url: state.checkout.success_url.clone(),
        cancel_url: state.checkout.cancel_url.clone(),
    };
    let session = match state.gateway.create_checkout_session(request).await {
        Ok(session) => session,
        Err(err) => {
            tracing::error!(payment_id = %payment.id, error = %err, "Could not open checkout session");
            state
                .commerce
                .fail_payment(payment.id, &format!("session-error:{}", payment.id), &err.to_string(), now)
                .await?;
            metrics::record_payment("failed");
            return Err(err.into());
        }
    };

    let payment = state
        .commerce
        .attach_checkout_session(payment.id, &session.gateway_reference, &session.checkout_url, now)
        .await?;
    metrics::record_payment("started");
    tracing::info!(
        payment_id = %payment.id,
        user_id = %payer.id,
        purpose = %purpose,
        amount_cents = amount.cents(),
        "Gateway payment started"
    );

    Ok(PaymentStarted {
        payment_id: payment.id,
        checkout_url: session.checkout_url,
        amount,
    })
}

/// Apply a signed gateway event.
///
/// # Errors
///
/// - 400 for a body that is not a webhook event
/// - 401 for a missing or wrong signature
/// - 404 for an unknown payment
/// - 409 when a failed payment is reported as captured
/// - 422 when the captured amount differs from the payment
pub async fn webhook(
    State(state): State<AppState>,
    CorrelationId(correlation_id): CorrelationId,
    headers: HeaderMap,
    body: Bytes,
) -> WebResult<Json<WebhookReply>> {
    let header = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !signature::verify(&state.checkout.webhook_secret, &body, header) {
        tracing::warn!(correlation_id = %correlation_id, "Rejected webhook with invalid signature");
        return Err(AppError::unauthorized("Invalid webhook signature"));
    }

    let event: WebhookEvent = serde_json::from_slice(&body)
        .map_err(|e| AppError::bad_request(format!("Malformed webhook payload: {e}")))?;
    tracing::info!(
        correlation_id = %correlation_id,
        event_id = %event.event_id,
        event_type = %event.event_type,
        payment_id = %event.payment_id,
        "Webhook received"
    );

    let now = state.now();
    match event.event_type.as_str() {
        PAYMENT_SUCCEEDED => {
            let outcome = state
                .commerce
                .confirm_payment(
                    PaymentConfirmation {
                        event_id: event.event_id,
                        payment_id: event.payment_id,
                        gateway_reference: event.gateway_reference,
                        amount: Money::from_cents(event.amount_cents),
                    },
                    now,
                )
                .await?;
            match &outcome {
                FulfillmentOutcome::Fulfilled { order, .. } => {
                    metrics::record_payment("succeeded");
                    if let Some(order) = order {
                        metrics::record_order(order, "gateway");
                    }
                }
                FulfillmentOutcome::AlreadyProcessed { .. } => metrics::record_payment("duplicate"),
            }
            Ok(Json(WebhookReply::Confirmation(outcome)))
        }
        PAYMENT_FAILED => {
            let reason = event.failure_reason.as_deref().unwrap_or("declined by the gateway");
            let payment = state
                .commerce
                .fail_payment(event.payment_id, &event.event_id, reason, now)
                .await?;
            if payment.status == PaymentStatus::Failed {
                metrics::record_payment("failed");
            }
            Ok(Json(WebhookReply::Failure {
                outcome: "failed",
                payment,
            }))
        }
        other => {
            tracing::debug!(event_type = other, "Ignoring webhook event");
            Ok(Json(WebhookReply::Ignored {
                outcome: "ignored",
                event_type: other.to_string(),
            }))
        }
    }
}

/// One payment.
///
/// # Errors
///
/// Returns 404 unless the caller made the payment or is an admin.
pub async fn get_payment(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<PaymentId>,
) -> WebResult<Json<Payment>> {
    state
        .commerce
        .get_payment(id)
        .await?
        .filter(|p| p.user_id == current.user.id || current.is_admin())
        .map(Json)
        .ok_or_else(|| AppError::not_found("Payment", id))
}

/// The caller's payments, newest first.
///
/// # Errors
///
/// Returns 500 if the store fails.
pub async fn list_payments(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(page): Query<PageRequest>,
) -> WebResult<Json<Page<Payment>>> {
    Ok(Json(state.commerce.list_payments(current.user.id, page.clamped()).await?))
}
