//! Rate limiter trait for authentication attempts.
//!
//! Use Redis with a sliding window algorithm for distributed rate limiting.

use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Sliding window rate limiter.
///
/// # Example
///
/// ```no_run
/// use edumarket_auth::providers::RateLimiter;
/// use std::time::Duration;
///
/// # async fn example(limiter: &dyn RateLimiter) -> edumarket_auth::Result<()> {
/// // 5 magic links per email every 5 minutes
/// limiter.check_and_record("magic_link:ada@example.com", 5, Duration::from_secs(300)).await?;
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Check and record one attempt in one atomic operation.
    ///
    /// # Errors
    ///
    /// - Rate limit exceeded → `AuthError::RateLimited`
    /// - `Redis` error → `AuthError::InternalError`
    async fn check_and_record(&self, key: &str, max_attempts: u32, window: Duration) -> Result<()>;

    /// Reset the counter for a key.
    ///
    /// # Errors
    ///
    /// Returns error if the storage operation fails.
    async fn reset(&self, key: &str) -> Result<()>;
}
