//! Session store trait.

use crate::error::Result;
use crate::session::{Session, SessionId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use edumarket_core::UserId;

/// Session store.
///
/// This trait abstracts over session storage (Redis).
///
/// # Implementation Notes
///
/// - Sessions expire at `Session::expires_at`; stores should also set a
///   matching TTL so expired sessions are cleaned up
/// - `get_session` must reject sessions past their expiry even if the
///   backing store still holds them
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Create session.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Network request fails
    /// - Session ID already exists
    async fn create_session(&self, session: &Session) -> Result<()>;

    /// Get session.
    ///
    /// # Errors
    ///
    /// - Session not found → `AuthError::SessionNotFound`
    /// - Session expired → `AuthError::SessionExpired`
    async fn get_session(&self, session_id: SessionId, now: DateTime<Utc>) -> Result<Session>;

    /// Delete session.
    ///
    /// # Errors
    ///
    /// Returns error if network request fails.
    async fn delete_session(&self, session_id: SessionId) -> Result<()>;

    /// Delete all sessions for a user, returning how many were removed.
    ///
    /// # Errors
    ///
    /// Returns error if network request fails.
    async fn delete_user_sessions(&self, user_id: UserId) -> Result<usize>;
}
