//! Mock session store for testing.

use crate::error::{AuthError, Result};
use crate::providers::SessionStore;
use crate::session::{Session, SessionId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use edumarket_core::UserId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Mock session store.
///
/// Uses in-memory storage for testing.
#[derive(Debug, Clone, Default)]
pub struct MockSessionStore {
    sessions: Arc<Mutex<HashMap<SessionId, Session>>>,
}

impl MockSessionStore {
    /// Create a new mock session store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get count of stored sessions (for testing).
    ///
    /// # Errors
    ///
    /// Returns error if lock is poisoned.
    pub fn session_count(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<SessionId, Session>>> {
        self.sessions
            .lock()
            .map_err(|_| AuthError::InternalError("Mutex lock failed".to_string()))
    }
}

#[async_trait]
impl SessionStore for MockSessionStore {
    async fn create_session(&self, session: &Session) -> Result<()> {
        let mut sessions = self.lock()?;
        if sessions.contains_key(&session.session_id) {
            return Err(AuthError::InternalError("Session ID already exists".to_string()));
        }
        sessions.insert(session.session_id, session.clone());
        Ok(())
    }

    async fn get_session(&self, session_id: SessionId, now: DateTime<Utc>) -> Result<Session> {
        let sessions = self.lock()?;
        let session = sessions.get(&session_id).ok_or(AuthError::SessionNotFound)?;
        if session.is_expired(now) {
            return Err(AuthError::SessionExpired);
        }
        Ok(session.clone())
    }

    async fn delete_session(&self, session_id: SessionId) -> Result<()> {
        self.lock()?.remove(&session_id);
        Ok(())
    }

    async fn delete_user_sessions(&self, user_id: UserId) -> Result<usize> {
        let mut sessions = self.lock()?;
        let before = sessions.len();
        sessions.retain(|_, s| s.user_id != user_id);
        Ok(before - sessions.len())
    }
}
