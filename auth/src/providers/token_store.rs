//! Token store trait.
//!
//! Magic link tokens are stored under the SHA-256 of the token and
//! consumed atomically, so each link works at most once.

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use edumarket_core::UserId;
use serde::{Deserialize, Serialize};

/// Data stored for an outstanding magic link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MagicLinkToken {
    /// Account the link logs into.
    pub user_id: UserId,

    /// Address the link was sent to.
    pub email: String,

    /// Expiration time.
    pub expires_at: DateTime<Utc>,

    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Token store.
///
/// # Security Requirements
///
/// 1. **Atomicity**: `consume` must atomically read and delete
/// 2. **Single-use**: once consumed, a token cannot be reused
/// 3. **Expiration**: expired tokens must be rejected
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Store a token under `token_hash`.
    ///
    /// # Errors
    ///
    /// Returns error if the storage operation fails.
    async fn store(&self, token_hash: &str, token: MagicLinkToken) -> Result<()>;

    /// Consume a token atomically.
    ///
    /// Returns `Ok(None)` when the token is unknown, already consumed or
    /// expired at `now`.
    ///
    /// # Errors
    ///
    /// Returns error if the storage operation fails.
    async fn consume(&self, token_hash: &str, now: DateTime<Utc>) -> Result<Option<MagicLinkToken>>;
}
