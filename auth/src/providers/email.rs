//! Email provider trait.

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Email provider.
///
/// This trait abstracts over email delivery (SMTP relay in production, the
/// console in development).
#[async_trait]
pub trait EmailProvider: Send + Sync {
    /// Send a magic link email.
    ///
    /// # Arguments
    ///
    /// - `to`: Recipient email address
    /// - `link`: Complete magic link URL
    /// - `expires_at`: Token expiration timestamp
    ///
    /// # Errors
    ///
    /// Returns `AuthError::EmailError` if the message cannot be built or
    /// delivered.
    async fn send_magic_link(&self, to: &str, link: &str, expires_at: DateTime<Utc>) -> Result<()>;

    /// Send a plain notification (guardian requests, withdrawal decisions).
    ///
    /// # Errors
    ///
    /// Returns `AuthError::EmailError` if the message cannot be built or
    /// delivered.
    async fn send_notification(&self, to: &str, subject: &str, message: &str) -> Result<()>;
}
