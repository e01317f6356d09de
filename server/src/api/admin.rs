//! Admin dashboard, reports and account management.

use crate::auth::RequireAdmin;
use crate::server::state::AppState;
use axum::{
    Json,
    extract::{Path, Query, State},
};
use edumarket_core::model::{DashboardSummary, RevenueBucket, TopContent, TopTeacher, User, UserFilter};
use edumarket_core::{Page, PageRequest, UserId};
use edumarket_web::{AppError, WebResult};
use serde::Deserialize;

const DEFAULT_MONTHS: u32 = 12;
const MAX_MONTHS: u32 = 36;
const DEFAULT_LIMIT: u32 = 10;
const MAX_LIMIT: u32 = 100;

/// `?months=N`
#[derive(Debug, Default, Deserialize)]
pub struct RevenueQuery {
    /// Calendar months including the current one
    pub months: Option<u32>,
}

/// `?limit=N`
#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    /// Number of rows
    pub limit: Option<u32>,
}

/// Account status change.
#[derive(Debug, Deserialize)]
pub struct UserStatusRequest {
    /// `false` deactivates the account and ends its sessions
    pub is_active: bool,
}

fn in_range(name: &str, value: Option<u32>, default: u32, max: u32) -> WebResult<u32> {
    let value = value.unwrap_or(default);
    if (1..=max).contains(&value) {
        Ok(value)
    } else {
        Err(AppError::validation(format!("{name} must be between 1 and {max}")))
    }
}

/// `GET /api/admin/dashboard`
///
/// # Errors
///
/// Returns 403 unless the caller is an admin.
pub async fn dashboard(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> WebResult<Json<DashboardSummary>> {
    Ok(Json(state.reports.dashboard().await?))
}

/// `GET /api/admin/reports/revenue?months=12`
///
/// # Errors
///
/// Returns 422 for `months` outside 1..=36.
pub async fn revenue(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<RevenueQuery>,
) -> WebResult<Json<Vec<RevenueBucket>>> {
    let months = in_range("months", query.months, DEFAULT_MONTHS, MAX_MONTHS)?;
    Ok(Json(state.reports.revenue_by_month(months, state.now()).await?))
}

/// `GET /api/admin/reports/top-content?limit=10`
///
/// # Errors
///
/// Returns 422 for `limit` outside 1..=100.
pub async fn top_content(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<LimitQuery>,
) -> WebResult<Json<Vec<TopContent>>> {
    let limit = in_range("limit", query.limit, DEFAULT_LIMIT, MAX_LIMIT)?;
    Ok(Json(state.reports.top_content(limit).await?))
}

/// `GET /api/admin/reports/top-teachers?limit=10`
///
/// # Errors
///
/// Returns 422 for `limit` outside 1..=100.
pub async fn top_teachers(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<LimitQuery>,
) -> WebResult<Json<Vec<TopTeacher>>> {
    let limit = in_range("limit", query.limit, DEFAULT_LIMIT, MAX_LIMIT)?;
    Ok(Json(state.reports.top_teachers(limit).await?))
}

/// `GET /api/admin/users?role=teacher&page=1`
///
/// # Errors
///
/// Returns 403 unless the caller is an admin.
pub async fn list_users(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(filter): Query<UserFilter>,
    Query(page): Query<PageRequest>,
) -> WebResult<Json<Page<User>>> {
    Ok(Json(state.users.list_users(filter, page.clamped()).await?))
}

/// `PATCH /api/admin/users/:id`: activate or deactivate an account.
///
/// Deactivation ends every session of the account.
///
/// # Errors
///
/// - 404 for unknown accounts
/// - 422 when admins try to deactivate themselves
pub async fn set_user_status(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<UserId>,
    Json(request): Json<UserStatusRequest>,
) -> WebResult<Json<User>> {
    if id == admin.id && !request.is_active {
        return Err(AppError::validation("Admins cannot deactivate their own account"));
    }

    let user = state.users.set_active(id, request.is_active).await?;
    if request.is_active {
        tracing::info!(user_id = %id, admin_id = %admin.id, "Account activated");
    } else {
        let revoked = state.auth.revoke_all(id).await?;
        tracing::warn!(user_id = %id, admin_id = %admin.id, revoked_sessions = revoked, "Account deactivated");
    }
    Ok(Json(user))
}
