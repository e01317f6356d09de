//! Console email provider for development and testing.

use crate::error::Result;
use crate::providers::EmailProvider;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::info;

/// Console email provider.
///
/// Logs emails instead of sending them. Used when no SMTP relay is
/// configured.
#[derive(Clone, Debug, Default)]
pub struct ConsoleEmailProvider;

impl ConsoleEmailProvider {
    /// Create a new console email provider.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EmailProvider for ConsoleEmailProvider {
    async fn send_magic_link(&self, to: &str, link: &str, expires_at: DateTime<Utc>) -> Result<()> {
        info!(
            to = %to,
            link = %link,
            expires_at = %expires_at,
            "Magic link email (development mode)"
        );
        Ok(())
    }

    async fn send_notification(&self, to: &str, subject: &str, message: &str) -> Result<()> {
        info!(
            to = %to,
            subject = %subject,
            message = %message,
            "Notification email (development mode)"
        );
        Ok(())
    }
}
