//! Signup, magic-link login and profile endpoints.
//!
//! - `POST /api/auth/signup`
//! - `POST /api/auth/magic-link`
//! - `POST /api/auth/magic-link/verify`
//! - `POST /api/auth/logout`
//! - `GET|PATCH /api/me`

use super::middleware::CurrentUser;
use crate::metrics;
use crate::server::state::AppState;
use axum::{Json, extract::State, http::StatusCode};
use chrono::{DateTime, Utc};
use edumarket_auth::IssuedLink;
use edumarket_core::model::{NewUser, ProfilePatch, User};
use edumarket_core::{Role, validation};
use edumarket_web::{AppError, ClientIp, CorrelationId, WebResult};
use serde::{Deserialize, Serialize};

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request to create an account.
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    /// Email address (normalized before storage)
    pub email: String,
    /// Display name
    pub name: String,
    /// Student, teacher or guardian
    pub role: Role,
}

/// Response after signup.
#[derive(Debug, Serialize)]
pub struct SignupResponse {
    /// The new account
    pub user: User,
    /// Login link, only when testing exposure is enabled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub magic_link: Option<String>,
}

/// Request for a login link.
#[derive(Debug, Deserialize)]
pub struct MagicLinkRequest {
    /// Account email
    pub email: String,
}

/// Response to a login-link request; identical for unknown accounts.
#[derive(Debug, Serialize)]
pub struct MagicLinkResponse {
    /// Generic confirmation
    pub message: &'static str,
    /// Login link, only when testing exposure is enabled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub magic_link: Option<String>,
}

/// Request to exchange a token for a session.
#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    /// Token from the magic link
    pub token: String,
}

/// A new session.
#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    /// Bearer token for `Authorization: Bearer <token>`
    pub token: String,
    /// Session expiry
    pub expires_at: DateTime<Utc>,
    /// The logged-in account
    pub user: User,
}

const MAGIC_LINK_SENT: &str = "If an account exists for this email, a login link has been sent";

fn exposed(state: &AppState, link: IssuedLink) -> Option<String> {
    state.auth.config().expose_magic_links.then_some(link.link)
}

// ============================================================================
// Handlers
// ============================================================================

/// Create an account and email a first login link.
///
/// # Errors
///
/// - 422 for an invalid email or name, or the admin role
/// - 409 if the email is taken
pub async fn signup(
    State(state): State<AppState>,
    Json(request): Json<SignupRequest>,
) -> WebResult<(StatusCode, Json<SignupResponse>)> {
    let email = validation::normalize_email(&request.email);
    validation::email(&email)?;
    let name = request.name.trim().to_string();
    validation::name(&name)?;
    if !request.role.is_self_service() {
        return Err(AppError::validation("Admin accounts cannot be created through signup"));
    }

    let now = state.now();
    let user = state
        .users
        .create_user(
            NewUser {
                email,
                name,
                role: request.role,
            },
            now,
        )
        .await?;
    metrics::record_signup(user.role);
    tracing::info!(user_id = %user.id, role = %user.role, "Account created");

    // A lost email is recovered through `POST /auth/magic-link`.
    let magic_link = match state.auth.issue(user.id, &user.email, now).await {
        Ok(link) => exposed(&state, link),
        Err(err) => {
            tracing::warn!(user_id = %user.id, error = %err, "Failed to send signup magic link");
            None
        }
    };
    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            magic_link,
            user,
        }),
    ))
}

/// Email a login link.
///
/// Always 202 so the endpoint cannot be used to discover accounts.
///
/// # Errors
///
/// - 422 for a malformed email
/// - 429 once the per-email limit is reached
pub async fn request_magic_link(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    CorrelationId(correlation_id): CorrelationId,
    Json(request): Json<MagicLinkRequest>,
) -> WebResult<(StatusCode, Json<MagicLinkResponse>)> {
    let email = validation::normalize_email(&request.email);
    validation::email(&email)?;
    state.auth.throttle(&email).await?;

    let magic_link = match state.users.find_user_by_email(&email).await? {
        Some(user) if user.is_active => {
            let link = state.auth.issue(user.id, &user.email, state.now()).await?;
            exposed(&state, link)
        }
        _ => {
            tracing::info!(
                client_ip = %ip,
                correlation_id = %correlation_id,
                "Magic link requested for unknown or inactive account"
            );
            None
        }
    };

    Ok((
        StatusCode::ACCEPTED,
        Json(MagicLinkResponse {
            message: MAGIC_LINK_SENT,
            magic_link,
        }),
    ))
}

/// Exchange a magic-link token for a session.
///
/// # Errors
///
/// - 401 for an unknown, used or expired token
/// - 403 if the account was deactivated
pub async fn verify_magic_link(
    State(state): State<AppState>,
    Json(request): Json<VerifyRequest>,
) -> WebResult<Json<VerifyResponse>> {
    let now = state.now();
    let token = state.auth.verify(request.token.trim(), now).await?;
    let mut user = state
        .users
        .find_user(token.user_id)
        .await?
        .ok_or_else(|| AppError::unauthorized("Invalid or expired magic link token"))?;

    if !user.is_active {
        return Err(AppError::forbidden("This account has been deactivated"));
    }
    if !user.email_verified {
        state.users.mark_email_verified(user.id).await?;
        user.email_verified = true;
    }

    let session = state.auth.open_session(user.id, &user.email, now).await?;
    tracing::info!(user_id = %user.id, "Session opened");
    Ok(Json(VerifyResponse {
        token: session.session_id.to_string(),
        expires_at: session.expires_at,
        user,
    }))
}

/// Revoke the caller's session.
///
/// # Errors
///
/// Returns 401 without a valid session.
pub async fn logout(State(state): State<AppState>, current: CurrentUser) -> WebResult<StatusCode> {
    state.auth.logout(current.session.session_id).await?;
    tracing::info!(user_id = %current.user.id, "Session closed");
    Ok(StatusCode::NO_CONTENT)
}

/// The caller's account.
pub async fn me(current: CurrentUser) -> Json<User> {
    Json(current.user)
}

/// Update the caller's name or bio.
///
/// # Errors
///
/// Returns 422 for a blank or overlong name, or an overlong bio.
pub async fn update_me(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(mut patch): Json<ProfilePatch>,
) -> WebResult<Json<User>> {
    if let Some(name) = patch.name.as_mut() {
        *name = name.trim().to_string();
        validation::name(name)?;
    }
    if let Some(bio) = patch.bio.as_deref() {
        validation::optional_text("bio", bio, validation::MAX_BIO_LEN)?;
    }
    let user = state.users.update_profile(current.user.id, patch).await?;
    Ok(Json(user))
}
