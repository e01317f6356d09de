//! Redis-based magic link token store.
//!
//! Tokens are stored under `auth:token:{sha256(token)}` with a TTL matching
//! their expiry and consumed with `GETDEL`, so concurrent verifications of
//! the same link result in exactly one success.

use crate::error::Result;
use crate::providers::{MagicLinkToken, TokenStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

/// `Redis`-based token store with atomic consumption.
#[derive(Clone)]
pub struct RedisTokenStore {
    /// Connection manager for connection pooling.
    conn_manager: ConnectionManager,
}

impl RedisTokenStore {
    /// Create a store over an existing connection manager.
    #[must_use]
    pub const fn new(conn_manager: ConnectionManager) -> Self {
        Self { conn_manager }
    }

    fn token_key(token_hash: &str) -> String {
        format!("auth:token:{token_hash}")
    }
}

#[async_trait]
impl TokenStore for RedisTokenStore {
    async fn store(&self, token_hash: &str, token: MagicLinkToken) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        let payload = serde_json::to_string(&token)?;

        #[allow(clippy::cast_sign_loss)]
        let ttl_seconds = (token.expires_at - token.created_at).num_seconds().max(1) as u64;

        let _: () = conn.set_ex(Self::token_key(token_hash), payload, ttl_seconds).await?;

        tracing::info!(
            user_id = %token.user_id,
            ttl_seconds,
            expires_at = %token.expires_at,
            "Stored magic link token"
        );
        Ok(())
    }

    async fn consume(&self, token_hash: &str, now: DateTime<Utc>) -> Result<Option<MagicLinkToken>> {
        let mut conn = self.conn_manager.clone();
        let payload: Option<String> = conn.get_del(Self::token_key(token_hash)).await?;

        let Some(payload) = payload else {
            tracing::debug!("Token not found (consumed, expired, or invalid)");
            return Ok(None);
        };
        let token: MagicLinkToken = serde_json::from_str(&payload)?;

        if token.expires_at <= now {
            tracing::warn!(
                user_id = %token.user_id,
                expires_at = %token.expires_at,
                "Token consumption failed: token expired"
            );
            return Ok(None);
        }

        tracing::info!(user_id = %token.user_id, "Token consumed (single-use)");
        Ok(Some(token))
    }
}
