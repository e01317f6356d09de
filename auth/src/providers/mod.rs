//! Provider traits for the services authentication depends on.
//!
//! All traits are object safe so the application can hold them as
//! `Arc<dyn …>` and swap Redis/SMTP for in-memory implementations in tests.

pub mod console_email;
pub mod email;
pub mod rate_limiter;
pub mod session;
pub mod smtp_email;
pub mod token_store;

pub use console_email::ConsoleEmailProvider;
pub use email::EmailProvider;
pub use rate_limiter::RateLimiter;
pub use session::SessionStore;
pub use smtp_email::SmtpEmailProvider;
pub use token_store::{MagicLinkToken, TokenStore};
