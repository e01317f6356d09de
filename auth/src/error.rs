//! Error types for authentication operations.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for authentication operations.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Failure modes of the authentication layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    // ═══════════════════════════════════════════════════════════
    // Authentication Errors
    // ═══════════════════════════════════════════════════════════

    /// No credentials, or credentials of the wrong shape.
    #[error("Authentication required")]
    Unauthorized,

    /// Magic link token is unknown, already used or expired.
    #[error("Invalid or expired magic link token")]
    InvalidToken,

    // ═══════════════════════════════════════════════════════════
    // Session Errors
    // ═══════════════════════════════════════════════════════════

    /// Session has expired.
    #[error("Session has expired")]
    SessionExpired,

    /// Session not found (never existed or revoked).
    #[error("Session not found")]
    SessionNotFound,

    // ═══════════════════════════════════════════════════════════
    // Rate Limiting
    // ═══════════════════════════════════════════════════════════

    /// Too many attempts for one key.
    #[error("Too many attempts, please retry after {retry_after:?}")]
    RateLimited {
        /// Duration to wait before retrying
        retry_after: Duration,
    },

    // ═══════════════════════════════════════════════════════════
    // System Errors
    // ═══════════════════════════════════════════════════════════

    /// Email delivery failed.
    #[error("Email error: {0}")]
    EmailError(String),

    /// Stored data could not be (de)serialized.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Backing store failed (should not be exposed to users).
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl AuthError {
    /// Returns `true` if the caller must (re-)authenticate.
    ///
    /// # Examples
    ///
    /// ```
    /// # use edumarket_auth::AuthError;
    /// assert!(AuthError::SessionExpired.requires_login());
    /// assert!(!AuthError::EmailError("relay down".into()).requires_login());
    /// ```
    #[must_use]
    pub const fn requires_login(&self) -> bool {
        matches!(
            self,
            Self::Unauthorized | Self::InvalidToken | Self::SessionExpired | Self::SessionNotFound
        )
    }
}

impl From<redis::RedisError> for AuthError {
    fn from(err: redis::RedisError) -> Self {
        Self::InternalError(format!("Redis error: {err}"))
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}
