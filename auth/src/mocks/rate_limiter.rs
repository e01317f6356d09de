//! Mock rate limiter for testing.

use crate::error::{AuthError, Result};
use crate::providers::RateLimiter;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// In-memory sliding window rate limiter.
///
/// Old entries are only pruned when the same key is checked again.
#[derive(Debug, Clone, Default)]
pub struct MockRateLimiter {
    /// Map of key -> attempt instants
    attempts: Arc<Mutex<HashMap<String, Vec<Instant>>>>,
}

impl MockRateLimiter {
    /// Create a new mock rate limiter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Vec<Instant>>>> {
        self.attempts
            .lock()
            .map_err(|_| AuthError::InternalError("Mutex lock failed".into()))
    }
}

#[async_trait]
impl RateLimiter for MockRateLimiter {
    async fn check_and_record(&self, key: &str, max_attempts: u32, window: Duration) -> Result<()> {
        let mut attempts = self.lock()?;
        let now = Instant::now();
        let timestamps = attempts.entry(key.to_string()).or_default();
        timestamps.retain(|ts| now.duration_since(*ts) < window);

        if timestamps.len() >= max_attempts as usize {
            tracing::warn!(key = %key, attempts = timestamps.len() + 1, max_attempts, "Mock rate limit exceeded");
            return Err(AuthError::RateLimited { retry_after: window });
        }

        timestamps.push(now);
        Ok(())
    }

    async fn reset(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}
