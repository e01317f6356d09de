//! Mock email provider for testing.

use crate::error::{AuthError, Result};
use crate::providers::EmailProvider;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// A message captured by [`MockEmailProvider`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentEmail {
    /// Recipient.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// Body; for magic links this is the link itself.
    pub body: String,
}

/// Records emails instead of sending them.
#[derive(Debug, Clone, Default)]
pub struct MockEmailProvider {
    sent: Arc<Mutex<Vec<SentEmail>>>,
    failing: Arc<AtomicBool>,
}

impl MockEmailProvider {
    /// Create a new mock email provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following send fail as if the mail server rejected it.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn ensure_deliverable(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(AuthError::EmailError("mock mail server rejected the message".into()))
        } else {
            Ok(())
        }
    }

    /// Every email sent so far.
    ///
    /// # Errors
    ///
    /// Returns error if lock is poisoned.
    pub fn sent(&self) -> Result<Vec<SentEmail>> {
        Ok(self.lock()?.clone())
    }

    /// Token of the most recent magic link sent to `to`.
    ///
    /// # Errors
    ///
    /// Returns error if lock is poisoned.
    pub fn last_token_for(&self, to: &str) -> Result<Option<String>> {
        Ok(self
            .lock()?
            .iter()
            .rev()
            .filter(|m| m.to == to)
            .find_map(|m| m.body.split_once("token=").map(|(_, t)| t.to_string())))
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<SentEmail>>> {
        self.sent
            .lock()
            .map_err(|_| AuthError::InternalError("Mutex lock failed".into()))
    }
}

#[async_trait]
impl EmailProvider for MockEmailProvider {
    async fn send_magic_link(&self, to: &str, link: &str, _expires_at: DateTime<Utc>) -> Result<()> {
        self.ensure_deliverable()?;
        self.lock()?.push(SentEmail {
            to: to.to_string(),
            subject: "Sign in to Edumarket".to_string(),
            body: link.to_string(),
        });
        Ok(())
    }

    async fn send_notification(&self, to: &str, subject: &str, message: &str) -> Result<()> {
        self.ensure_deliverable()?;
        self.lock()?.push(SentEmail {
            to: to.to_string(),
            subject: subject.to_string(),
            body: message.to_string(),
        });
        Ok(())
    }
}
