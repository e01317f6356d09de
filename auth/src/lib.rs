//! # Edumarket Authentication
//!
//! Passwordless authentication for the marketplace.
//!
//! - **Magic links**: a single-use token is emailed to the account address;
//!   presenting it opens a session.
//! - **Sessions**: opaque bearer tokens (session UUIDs) stored with a TTL.
//! - **Rate limiting**: sliding-window limits on magic-link requests.
//!
//! Every backing service sits behind a trait in [`providers`], with Redis
//! (and SMTP) implementations in [`stores`] and in-memory ones in [`mocks`].
//!
//! ## Example
//!
//! ```
//! use edumarket_auth::token::{generate_token, hash_token};
//!
//! let token = generate_token();
//! assert_eq!(token.len(), 43);
//! assert_eq!(hash_token(&token), hash_token(&token));
//! ```

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]

pub mod config;
pub mod error;
pub mod magic_link;
pub mod providers;
pub mod session;
pub mod stores;
pub mod token;

#[cfg(any(test, feature = "test-utils"))]
pub mod mocks;

pub use config::AuthConfig;
pub use error::{AuthError, Result};
pub use magic_link::{IssuedLink, MagicLinks};
pub use session::{Session, SessionId};
