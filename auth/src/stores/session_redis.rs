//! Redis-based session store implementation.
//!
//! Sessions are stored with:
//! - **Primary key**: `session:{session_id}` → JSON-serialized `Session`
//! - **User index**: `user:{user_id}:sessions` (Set) → session ids, used to
//!   revoke every session of a deactivated account
//! - **TTL**: remaining lifetime of the session

use crate::error::{AuthError, Result};
use crate::providers::SessionStore;
use crate::session::{Session, SessionId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use edumarket_core::UserId;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

/// Redis-based session store with TTL-based expiration.
#[derive(Clone)]
pub struct RedisSessionStore {
    /// Connection manager for connection pooling.
    conn_manager: ConnectionManager,
}

impl RedisSessionStore {
    /// Create a store over an existing connection manager.
    #[must_use]
    pub const fn new(conn_manager: ConnectionManager) -> Self {
        Self { conn_manager }
    }

    fn session_key(session_id: SessionId) -> String {
        format!("session:{session_id}")
    }

    fn user_sessions_key(user_id: UserId) -> String {
        format!("user:{user_id}:sessions")
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn create_session(&self, session: &Session) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        let session_key = Self::session_key(session.session_id);
        let user_sessions_key = Self::user_sessions_key(session.user_id);

        let exists: bool = conn.exists(&session_key).await?;
        if exists {
            return Err(AuthError::InternalError("Session ID already exists".into()));
        }

        let payload = serde_json::to_string(session)?;

        #[allow(clippy::cast_sign_loss)]
        let ttl_seconds = (session.expires_at - session.created_at).num_seconds().max(1) as u64;

        // The user index outlives every session it lists by a day
        #[allow(clippy::cast_possible_wrap)]
        let set_ttl_seconds = (ttl_seconds + 86_400) as i64;

        let _: () = redis::pipe()
            .atomic()
            .set_ex(&session_key, payload, ttl_seconds)
            .sadd(&user_sessions_key, session.session_id.to_string())
            .ignore()
            .expire(&user_sessions_key, set_ttl_seconds)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(|e| AuthError::InternalError(format!("Failed to create session: {e}")))?;

        tracing::info!(
            session_id = %session.session_id,
            user_id = %session.user_id,
            ttl_seconds,
            "Created session in Redis"
        );

        Ok(())
    }

    async fn get_session(&self, session_id: SessionId, now: DateTime<Utc>) -> Result<Session> {
        let mut conn = self.conn_manager.clone();
        let payload: Option<String> = conn.get(Self::session_key(session_id)).await?;

        let Some(payload) = payload else {
            return Err(AuthError::SessionNotFound);
        };
        let session: Session = serde_json::from_str(&payload)?;

        if session.is_expired(now) {
            tracing::warn!(
                session_id = %session_id,
                expires_at = %session.expires_at,
                "Session expired (TTL should have cleaned this up)"
            );
            return Err(AuthError::SessionExpired);
        }

        Ok(session)
    }

    async fn delete_session(&self, session_id: SessionId) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        let session_key = Self::session_key(session_id);

        let payload: Option<String> = conn.get(&session_key).await?;
        let Some(payload) = payload else {
            return Ok(());
        };
        let session: Session = serde_json::from_str(&payload)?;

        let _: () = redis::pipe()
            .atomic()
            .del(&session_key)
            .ignore()
            .srem(Self::user_sessions_key(session.user_id), session_id.to_string())
            .ignore()
            .query_async(&mut conn)
            .await?;

        tracing::info!(session_id = %session_id, "Deleted session");
        Ok(())
    }

    async fn delete_user_sessions(&self, user_id: UserId) -> Result<usize> {
        let mut conn = self.conn_manager.clone();
        let user_sessions_key = Self::user_sessions_key(user_id);

        let session_ids: Vec<String> = conn.smembers(&user_sessions_key).await?;
        if session_ids.is_empty() {
            return Ok(0);
        }

        let mut pipe = redis::pipe();
        pipe.atomic();
        for id in &session_ids {
            pipe.del(format!("session:{id}")).ignore();
        }
        pipe.del(&user_sessions_key).ignore();
        let _: () = pipe.query_async(&mut conn).await?;

        tracing::info!(user_id = %user_id, count = session_ids.len(), "Revoked all user sessions");
        Ok(session_ids.len())
    }
}
