//! In-memory providers for tests and local runs without Redis.

mod email;
mod rate_limiter;
mod session;
mod token_store;

pub use email::{MockEmailProvider, SentEmail};
pub use rate_limiter::MockRateLimiter;
pub use session::MockSessionStore;
pub use token_store::MockTokenStore;
