//! Authentication extractors for the marketplace.
//!
//! Provides Axum extractors for:
//! - Session validation from the bearer token ([`CurrentUser`])
//! - Optional login on public endpoints ([`OptionalUser`])
//! - Role-based access control ([`RequireAdmin`], [`RequireTeacher`],
//!   [`RequireGuardian`])
//!
//! The account is re-read on every request, so role changes and
//! deactivation take effect immediately.
//!
//! # Usage
//!
//! ```rust,ignore
//! async fn me(current: CurrentUser) -> Json<User> {
//!     Json(current.user)
//! }
//!
//! async fn dashboard(RequireAdmin(admin): RequireAdmin) -> WebResult<Json<DashboardSummary>> {
//!     // admin.role is guaranteed to be Role::Admin
//! }
//! ```

use crate::server::state::AppState;
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use edumarket_auth::Session;
use edumarket_core::access::Viewer;
use edumarket_core::model::User;
use edumarket_core::Role;
use edumarket_web::{AppError, BearerToken};

/// Authenticated, active account.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    /// The account, freshly loaded
    pub user: User,
    /// The session behind the bearer token
    pub session: Session,
}

impl CurrentUser {
    /// Access-policy view of the caller.
    #[must_use]
    pub const fn viewer(&self) -> Viewer {
        Viewer::of(&self.user)
    }

    /// Returns `true` for admins.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.user.role == Role::Admin
    }
}

async fn bearer(parts: &mut Parts, state: &AppState) -> Option<String> {
    match BearerToken::from_request_parts(parts, state).await {
        Ok(BearerToken(token)) => token,
        Err(never) => match never {},
    }
}

async fn authenticate(state: &AppState, token: &str) -> Result<CurrentUser, AppError> {
    let session = state.auth.authenticate(token, state.now()).await?;
    let user = state
        .users
        .find_user(session.user_id)
        .await?
        .ok_or_else(|| AppError::unauthorized("Account no longer exists"))?;

    if !user.is_active {
        tracing::warn!(user_id = %user.id, "Rejected request from deactivated account");
        return Err(AppError::forbidden("This account has been deactivated"));
    }

    Ok(CurrentUser { user, session })
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer(parts, state)
            .await
            .ok_or_else(|| AppError::unauthorized("Missing bearer token"))?;
        authenticate(state, &token).await
    }
}

/// Caller on a public endpoint.
///
/// `None` without an `Authorization` header. A header that is present but
/// invalid is still rejected with 401 so clients notice expired sessions.
#[derive(Debug, Clone)]
pub struct OptionalUser(pub Option<CurrentUser>);

impl OptionalUser {
    /// Access-policy view of the caller.
    #[must_use]
    pub fn viewer(&self) -> Viewer {
        self.0.as_ref().map_or(Viewer::Anonymous, CurrentUser::viewer)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for OptionalUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match bearer(parts, state).await {
            Some(token) => Ok(Self(Some(authenticate(state, &token).await?))),
            None => Ok(Self(None)),
        }
    }
}

macro_rules! role_guard {
    ($(#[$meta:meta])* $name:ident, $role:expr, $message:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        pub struct $name(pub User);

        #[async_trait]
        impl FromRequestParts<AppState> for $name {
            type Rejection = AppError;

            async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
                let current = CurrentUser::from_request_parts(parts, state).await?;
                if current.user.role != $role {
                    return Err(AppError::forbidden($message));
                }
                Ok(Self(current.user))
            }
        }
    };
}

role_guard!(
    /// Require an admin account (403 otherwise).
    RequireAdmin,
    Role::Admin,
    "Admin access required"
);

role_guard!(
    /// Require a teacher account (403 otherwise).
    RequireTeacher,
    Role::Teacher,
    "Only teachers can do this"
);

role_guard!(
    /// Require a guardian account (403 otherwise).
    RequireGuardian,
    Role::Guardian,
    "Only guardians can do this"
);
