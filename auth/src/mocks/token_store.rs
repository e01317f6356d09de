//! Mock token store for testing.

use crate::error::{AuthError, Result};
use crate::providers::{MagicLinkToken, TokenStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// In-memory token store with the same single-use semantics as Redis
/// `GETDEL`: check and delete happen under one lock.
#[derive(Debug, Clone, Default)]
pub struct MockTokenStore {
    tokens: Arc<Mutex<HashMap<String, MagicLinkToken>>>,
}

impl MockTokenStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of outstanding tokens (for testing).
    ///
    /// # Errors
    ///
    /// Returns error if lock is poisoned.
    pub fn token_count(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, MagicLinkToken>>> {
        self.tokens
            .lock()
            .map_err(|_| AuthError::InternalError("Mutex lock failed".to_string()))
    }
}

#[async_trait]
impl TokenStore for MockTokenStore {
    async fn store(&self, token_hash: &str, token: MagicLinkToken) -> Result<()> {
        self.lock()?.insert(token_hash.to_string(), token);
        Ok(())
    }

    async fn consume(&self, token_hash: &str, now: DateTime<Utc>) -> Result<Option<MagicLinkToken>> {
        let token = self.lock()?.remove(token_hash);
        Ok(token.filter(|t| t.expires_at > now))
    }
}
