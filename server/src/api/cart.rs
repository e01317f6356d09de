//! Cart, checkout and wallet endpoints.
//!
//! - GET /api/cart
//! - POST /api/cart/items
//! - DELETE /api/cart/items/:content_id
//! - DELETE /api/cart
//! - POST /api/checkout
//! - POST /api/wallet/top-up
//! - GET /api/wallet

use super::payments::{PaymentStarted, start_gateway_payment};
use crate::auth::CurrentUser;
use crate::metrics;
use crate::server::state::AppState;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use edumarket_core::model::{CartLine, CheckoutLine, PurchaseRequest, User, WalletView};
use edumarket_core::pricing::CartSummary;
use edumarket_core::{ContentId, Money, PageRequest, PaymentPurpose, Role, UserId};
use edumarket_web::{AppError, WebResult};
use serde::{Deserialize, Serialize};

// ============================================================================
// Request/Response Types
// ============================================================================

/// The caller's cart.
#[derive(Debug, Serialize)]
pub struct CartView {
    /// Lines, oldest first
    pub lines: Vec<CartLine>,
    /// Item count and subtotal
    pub summary: CartSummary,
}

/// Item to add.
#[derive(Debug, Deserialize)]
pub struct AddToCartRequest {
    /// Content to buy
    pub content_id: ContentId,
}

/// How to pay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutMethod {
    /// Debit the wallet balance now
    Wallet,
    /// Pay through the hosted checkout page
    Gateway,
}

/// Checkout request.
#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    /// Payment method
    pub method: CheckoutMethod,
    /// Student receiving the content; defaults to the buyer
    pub beneficiary_id: Option<UserId>,
}

/// Wallet top-up request.
#[derive(Debug, Deserialize)]
pub struct TopUpRequest {
    /// Amount to add
    pub amount_cents: u64,
}

// ============================================================================
// Cart
// ============================================================================

async fn cart_view(state: &AppState, user_id: UserId) -> WebResult<CartView> {
    let lines = state.cart.cart_lines(user_id).await?;
    let summary = CartSummary::preview(&lines);
    Ok(CartView { lines, summary })
}

/// The caller's cart.
///
/// # Errors
///
/// Returns 500 if the store fails.
pub async fn get_cart(State(state): State<AppState>, current: CurrentUser) -> WebResult<Json<CartView>> {
    Ok(Json(cart_view(&state, current.user.id).await?))
}

/// Put an item in the cart.
///
/// # Errors
///
/// - 404 for unknown items
/// - 409 if the caller already owns the item or it is already in the cart
/// - 422 for unpublished items and the caller's own content
pub async fn add_item(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(request): Json<AddToCartRequest>,
) -> WebResult<(StatusCode, Json<CartView>)> {
    let user_id = current.user.id;
    let content = state
        .catalog
        .get_content(request.content_id)
        .await?
        .filter(|c| c.is_published() || c.teacher_id == user_id)
        .ok_or_else(|| AppError::not_found("Content", request.content_id))?;

    if content.teacher_id == user_id {
        return Err(AppError::validation("You cannot buy your own content"));
    }
    if state.commerce.owns(user_id, content.id).await? {
        return Err(AppError::conflict("You already own this content"));
    }

    state.cart.add_to_cart(user_id, content.id, state.now()).await?;
    tracing::debug!(user_id = %user_id, content_id = %content.id, "Added to cart");
    Ok((StatusCode::CREATED, Json(cart_view(&state, user_id).await?)))
}

/// Take an item out of the cart.
///
/// # Errors
///
/// Returns 404 if the item is not in the cart.
pub async fn remove_item(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(content_id): Path<ContentId>,
) -> WebResult<StatusCode> {
    if state.cart.remove_from_cart(current.user.id, content_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found("Cart item", content_id))
    }
}

/// Empty the cart.
///
/// # Errors
///
/// Returns 500 if the store fails.
pub async fn clear_cart(State(state): State<AppState>, current: CurrentUser) -> WebResult<StatusCode> {
    state.cart.clear_cart(current.user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Checkout
// ============================================================================

/// Who receives the content: the buyer, or a student linked to a guardian.
async fn resolve_beneficiary(state: &AppState, buyer: &User, requested: Option<UserId>) -> WebResult<UserId> {
    let beneficiary = match requested {
        None => return Ok(buyer.id),
        Some(id) if id == buyer.id => return Ok(buyer.id),
        Some(id) => id,
    };
    if buyer.role != Role::Guardian || !state.users.is_guardian_of(buyer.id, beneficiary).await? {
        return Err(AppError::forbidden(
            "You can only buy for students who accepted your guardian request",
        ));
    }
    Ok(beneficiary)
}

/// Buy everything in the cart.
///
/// - `wallet`: paid and fulfilled at once, 201 with the order
/// - `gateway`: a pending payment and a hosted checkout page, 202
///
/// # Errors
///
/// - 402 if the wallet balance is too low
/// - 403 for a beneficiary who is not a linked student
/// - 409 if the beneficiary already owns an item
/// - 422 for an empty cart, unavailable items, or a free cart sent to the gateway
/// - 503 if the gateway is unreachable
pub async fn checkout(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(request): Json<CheckoutRequest>,
) -> WebResult<Response> {
    let buyer = current.user;
    let lines = state.cart.cart_lines(buyer.id).await?;
    if lines.is_empty() {
        return Err(AppError::validation("Your cart is empty"));
    }
    let summary = CartSummary::from_lines(&lines)?;
    let beneficiary_id = resolve_beneficiary(&state, &buyer, request.beneficiary_id).await?;

    let ids: Vec<ContentId> = lines.iter().map(|l| l.content_id).collect();
    let owned = state.commerce.owned_among(beneficiary_id, &ids).await?;
    if let Some(first) = lines.iter().find(|l| owned.contains(&l.content_id)) {
        return Err(AppError::conflict(format!(
            "'{}' is already owned; remove it from the cart first",
            first.title
        )));
    }

    let checkout_lines: Vec<CheckoutLine> = lines.iter().map(CheckoutLine::from).collect();
    match request.method {
        CheckoutMethod::Wallet => {
            let order = state
                .commerce
                .purchase_with_wallet(
                    PurchaseRequest {
                        buyer_id: buyer.id,
                        beneficiary_id,
                        lines: checkout_lines,
                        commission_bps: state.market.commission_bps,
                    },
                    state.now(),
                )
                .await?;
            metrics::record_order(&order, "wallet");
            Ok((StatusCode::CREATED, Json(order)).into_response())
        }
        CheckoutMethod::Gateway => {
            if summary.subtotal.is_zero() {
                return Err(AppError::validation("Free items are checked out with the wallet method"));
            }
            let description = format!("Edumarket order ({} items)", summary.item_count);
            let started = start_gateway_payment(
                &state,
                &buyer,
                beneficiary_id,
                PaymentPurpose::Checkout,
                summary.subtotal,
                checkout_lines,
                description,
            )
            .await?;
            Ok((StatusCode::ACCEPTED, Json(started)).into_response())
        }
    }
}

// ============================================================================
// Wallet
// ============================================================================

/// Add funds through the gateway.
///
/// # Errors
///
/// - 422 for zero or an amount above the configured maximum
/// - 503 if the gateway is unreachable
pub async fn top_up(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(request): Json<TopUpRequest>,
) -> WebResult<(StatusCode, Json<PaymentStarted>)> {
    if request.amount_cents == 0 {
        return Err(AppError::validation("amount_cents must be positive"));
    }
    if request.amount_cents > state.market.max_top_up_cents {
        return Err(AppError::validation(format!(
            "A single top-up is limited to {}",
            Money::from_cents(state.market.max_top_up_cents)
        )));
    }

    let buyer = current.user;
    let started = start_gateway_payment(
        &state,
        &buyer,
        buyer.id,
        PaymentPurpose::TopUp,
        Money::from_cents(request.amount_cents),
        Vec::new(),
        "Edumarket wallet top-up".to_string(),
    )
    .await?;
    Ok((StatusCode::ACCEPTED, Json(started)))
}

/// Balance and ledger, newest first.
///
/// # Errors
///
/// Returns 500 if the store fails.
pub async fn wallet(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(page): Query<PageRequest>,
) -> WebResult<Json<WalletView>> {
    Ok(Json(state.commerce.wallet(current.user.id, page.clamped()).await?))
}
