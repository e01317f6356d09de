//! Redis-based rate limiter implementation.
//!
//! Sliding window with sorted sets:
//! 1. Remove entries older than the window (ZREMRANGEBYSCORE)
//! 2. Count remaining entries (ZCARD)
//! 3. Add the current attempt (ZADD), scored by time under a unique member
//!
//! all inside one atomic pipeline.

use crate::error::{AuthError, Result};
use crate::providers::RateLimiter;
use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// `Redis`-based rate limiter using a sliding window.
#[derive(Clone)]
pub struct RedisRateLimiter {
    /// Connection manager for connection pooling.
    conn_manager: ConnectionManager,
}

impl RedisRateLimiter {
    /// Create a limiter over an existing connection manager.
    #[must_use]
    pub const fn new(conn_manager: ConnectionManager) -> Self {
        Self { conn_manager }
    }

    fn rate_limit_key(key: &str) -> String {
        format!("rate_limit:{key}")
    }

    /// Sorted-set member for one attempt; attempts in the same millisecond stay distinct.
    fn attempt_member(now_ms: u64) -> String {
        format!("{now_ms}-{}", Uuid::new_v4())
    }

    #[allow(clippy::cast_possible_truncation)]
    fn current_timestamp_ms() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_millis() as u64
    }
}

#[async_trait]
impl RateLimiter for RedisRateLimiter {
    async fn check_and_record(&self, key: &str, max_attempts: u32, window: Duration) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        let rate_key = Self::rate_limit_key(key);
        let now_ms = Self::current_timestamp_ms();
        #[allow(clippy::cast_possible_truncation)]
        let window_ms = window.as_millis() as u64;
        let window_start = now_ms.saturating_sub(window_ms);
        #[allow(clippy::cast_possible_wrap)]
        let expire_seconds = window.as_secs().max(1) as i64;

        // count is taken before the current attempt is added
        #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
        let (count,): (u64,) = redis::pipe()
            .atomic()
            .zrembyscore(&rate_key, 0, window_start as isize)
            .ignore()
            .zcard(&rate_key)
            .zadd(&rate_key, Self::attempt_member(now_ms), now_ms)
            .ignore()
            .expire(&rate_key, expire_seconds)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, key = %key, "Rate limit pipeline failed");
                AuthError::InternalError(format!("Failed to check and record rate limit: {e}"))
            })?;

        if count >= u64::from(max_attempts) {
            tracing::warn!(
                key = %key,
                attempts = count + 1,
                max_attempts,
                window_ms,
                "Rate limit exceeded"
            );
            return Err(AuthError::RateLimited { retry_after: window });
        }

        tracing::debug!(key = %key, attempts = count + 1, max_attempts, "Rate limit check passed");
        Ok(())
    }

    async fn reset(&self, key: &str) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        let _: () = conn.del(Self::rate_limit_key(key)).await?;
        tracing::info!(key = %key, "Reset rate limit");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attempts_in_same_millisecond_are_distinct() {
        let now_ms = RedisRateLimiter::current_timestamp_ms();
        let first = RedisRateLimiter::attempt_member(now_ms);
        let second = RedisRateLimiter::attempt_member(now_ms);

        assert_ne!(first, second);
        assert!(first.starts_with(&format!("{now_ms}-")));
    }
}
