//! Orders and the caller's library.

use crate::auth::CurrentUser;
use crate::server::state::AppState;
use axum::{
    Json,
    extract::{Path, Query, State},
};
use edumarket_core::model::{LibraryEntry, Order};
use edumarket_core::{OrderId, Page, PageRequest};
use edumarket_web::{AppError, WebResult};

/// `GET /api/orders`: orders the caller paid for, newest first.
///
/// # Errors
///
/// Returns 500 if the store fails.
pub async fn list_orders(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(page): Query<PageRequest>,
) -> WebResult<Json<Page<Order>>> {
    Ok(Json(state.commerce.list_orders(current.user.id, page.clamped()).await?))
}

/// `GET /api/orders/:id`: visible to the buyer, the beneficiary and admins.
///
/// # Errors
///
/// Returns 404 for anyone else.
pub async fn get_order(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<OrderId>,
) -> WebResult<Json<Order>> {
    let caller = current.user.id;
    state
        .commerce
        .get_order(id)
        .await?
        .filter(|o| o.buyer_id == caller || o.beneficiary_id == caller || current.is_admin())
        .map(Json)
        .ok_or_else(|| AppError::not_found("Order", id))
}

/// `GET /api/library`: everything the caller is enrolled in.
///
/// # Errors
///
/// Returns 500 if the store fails.
pub async fn library(State(state): State<AppState>, current: CurrentUser) -> WebResult<Json<Vec<LibraryEntry>>> {
    Ok(Json(state.commerce.library(current.user.id).await?))
}
