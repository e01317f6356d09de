//! Teacher withdrawals.
//!
//! Requesting a withdrawal holds the amount from the teacher's wallet; an
//! admin then pays it out or rejects it, which returns the held funds.

use super::notify;
use crate::auth::{RequireAdmin, RequireTeacher};
use crate::metrics;
use crate::server::state::AppState;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use edumarket_core::model::Withdrawal;
use edumarket_core::{Money, Page, PageRequest, WithdrawalId, WithdrawalStatus, validation};
use edumarket_web::{AppError, WebResult};
use serde::Deserialize;

/// Withdrawal request.
#[derive(Debug, Deserialize)]
pub struct WithdrawalRequest {
    /// Amount to pay out
    pub amount_cents: u64,
}

/// Admin list filter.
#[derive(Debug, Default, Deserialize)]
pub struct WithdrawalQuery {
    /// Only withdrawals in this status
    pub status: Option<WithdrawalStatus>,
}

/// Rejection reason.
#[derive(Debug, Deserialize)]
pub struct RejectRequest {
    /// Shown to the teacher
    pub reason: String,
}

/// `POST /api/withdrawals`
///
/// # Errors
///
/// - 402 if the balance is lower than the amount
/// - 422 below the minimum withdrawal
pub async fn request_withdrawal(
    State(state): State<AppState>,
    RequireTeacher(teacher): RequireTeacher,
    Json(request): Json<WithdrawalRequest>,
) -> WebResult<(StatusCode, Json<Withdrawal>)> {
    let minimum = state.market.min_withdrawal_cents;
    if request.amount_cents < minimum {
        return Err(AppError::validation(format!(
            "The minimum withdrawal is {}",
            Money::from_cents(minimum)
        )));
    }

    let withdrawal = state
        .commerce
        .request_withdrawal(teacher.id, Money::from_cents(request.amount_cents), state.now())
        .await?;
    metrics::record_withdrawal(withdrawal.status);
    tracing::info!(
        withdrawal_id = %withdrawal.id,
        teacher_id = %teacher.id,
        amount_cents = request.amount_cents,
        "Withdrawal requested"
    );
    Ok((StatusCode::CREATED, Json(withdrawal)))
}

/// `GET /api/withdrawals`: the teacher's own withdrawals.
///
/// # Errors
///
/// Returns 403 unless the caller is a teacher.
pub async fn my_withdrawals(
    State(state): State<AppState>,
    RequireTeacher(teacher): RequireTeacher,
    Query(page): Query<PageRequest>,
) -> WebResult<Json<Page<Withdrawal>>> {
    Ok(Json(
        state.commerce.list_withdrawals(Some(teacher.id), None, page.clamped()).await?,
    ))
}

/// `GET /api/admin/withdrawals?status=pending`
///
/// # Errors
///
/// Returns 403 unless the caller is an admin.
pub async fn list_withdrawals(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<WithdrawalQuery>,
    Query(page): Query<PageRequest>,
) -> WebResult<Json<Page<Withdrawal>>> {
    Ok(Json(
        state.commerce.list_withdrawals(None, query.status, page.clamped()).await?,
    ))
}

/// `POST /api/admin/withdrawals/:id/approve`
///
/// # Errors
///
/// Returns 409 unless the withdrawal is pending.
pub async fn approve_withdrawal(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<WithdrawalId>,
) -> WebResult<Json<Withdrawal>> {
    let withdrawal = state.commerce.approve_withdrawal(id, admin.id, state.now()).await?;
    metrics::record_withdrawal(withdrawal.status);
    tracing::info!(withdrawal_id = %id, admin_id = %admin.id, "Withdrawal paid");

    notify::user(
        &state,
        withdrawal.teacher_id,
        "Your withdrawal has been paid",
        &format!("Your withdrawal of {} has been paid out.", withdrawal.amount),
    )
    .await;
    Ok(Json(withdrawal))
}

/// `POST /api/admin/withdrawals/:id/reject`
///
/// # Errors
///
/// - 409 unless the withdrawal is pending
/// - 422 without a reason
pub async fn reject_withdrawal(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<WithdrawalId>,
    Json(request): Json<RejectRequest>,
) -> WebResult<Json<Withdrawal>> {
    let reason = request.reason.trim();
    validation::text("reason", reason, validation::MAX_BODY_LEN)?;

    let withdrawal = state
        .commerce
        .reject_withdrawal(id, admin.id, reason, state.now())
        .await?;
    metrics::record_withdrawal(withdrawal.status);
    tracing::info!(withdrawal_id = %id, admin_id = %admin.id, "Withdrawal rejected");

    notify::user(
        &state,
        withdrawal.teacher_id,
        "Your withdrawal was rejected",
        &format!(
            "Your withdrawal of {} was rejected: {reason}. The amount is back in your wallet.",
            withdrawal.amount
        ),
    )
    .await;
    Ok(Json(withdrawal))
}
