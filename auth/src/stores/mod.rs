//! Redis-backed stores.

pub mod rate_limiter_redis;
pub mod session_redis;
pub mod token_redis;

pub use rate_limiter_redis::RedisRateLimiter;
pub use session_redis::RedisSessionStore;
pub use token_redis::RedisTokenStore;

use crate::error::{AuthError, Result};
use redis::Client;
use redis::aio::ConnectionManager;

/// Open a pooled connection shared by every Redis store.
///
/// # Errors
///
/// Returns error if the URL is malformed or the server is unreachable.
pub async fn connect(redis_url: &str) -> Result<ConnectionManager> {
    let client = Client::open(redis_url)
        .map_err(|e| AuthError::InternalError(format!("Failed to create Redis client: {e}")))?;

    let conn_manager = ConnectionManager::new(client).await.map_err(|e| {
        AuthError::InternalError(format!("Failed to create Redis connection manager: {e}"))
    })?;

    tracing::info!("Redis connection manager initialized");
    Ok(conn_manager)
}
