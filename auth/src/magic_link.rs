//! Magic link login flow.
//!
//! ```text
//! request  → throttle(email) → issue(user) → email with link
//! verify   → consume(token)  → open_session(user) → bearer token
//! request with bearer → authenticate(session_id)
//! ```

use crate::config::AuthConfig;
use crate::error::{AuthError, Result};
use crate::providers::{EmailProvider, MagicLinkToken, RateLimiter, SessionStore, TokenStore};
use crate::session::{Session, SessionId};
use crate::token::{generate_token, hash_token};
use chrono::{DateTime, Utc};
use edumarket_core::UserId;
use std::sync::Arc;

/// A link that was just emailed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedLink {
    /// Full URL sent to the user.
    pub link: String,
    /// Raw token (only ever returned to the caller when testing exposure is on).
    pub token: String,
    /// Expiry of the token.
    pub expires_at: DateTime<Utc>,
}

/// Passwordless authentication over pluggable stores.
#[derive(Clone)]
pub struct MagicLinks {
    config: AuthConfig,
    tokens: Arc<dyn TokenStore>,
    sessions: Arc<dyn SessionStore>,
    limiter: Arc<dyn RateLimiter>,
    email: Arc<dyn EmailProvider>,
}

impl MagicLinks {
    /// Wire the flow over its stores.
    #[must_use]
    pub fn new(
        config: AuthConfig,
        tokens: Arc<dyn TokenStore>,
        sessions: Arc<dyn SessionStore>,
        limiter: Arc<dyn RateLimiter>,
        email: Arc<dyn EmailProvider>,
    ) -> Self {
        Self {
            config,
            tokens,
            sessions,
            limiter,
            email,
        }
    }

    /// Configuration in use.
    #[must_use]
    pub const fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Email provider, shared with other notifications.
    #[must_use]
    pub fn email(&self) -> Arc<dyn EmailProvider> {
        Arc::clone(&self.email)
    }

    /// Count one magic-link request for `email`.
    ///
    /// Called for every request, including unknown addresses, so the limit
    /// cannot be used to probe which accounts exist.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::RateLimited` once the configured limit is hit.
    pub async fn throttle(&self, email: &str) -> Result<()> {
        self.limiter
            .check_and_record(
                &throttle_key(email),
                self.config.rate_limit_requests,
                self.config.rate_limit_window,
            )
            .await
    }

    /// Create, store and email a magic link for an account.
    ///
    /// # Errors
    ///
    /// Returns error if the token cannot be stored or the email fails.
    pub async fn issue(&self, user_id: UserId, email: &str, now: DateTime<Utc>) -> Result<IssuedLink> {
        let token = generate_token();
        let expires_at = now + self.config.magic_link_ttl;

        self.tokens
            .store(
                &hash_token(&token),
                MagicLinkToken {
                    user_id,
                    email: email.to_string(),
                    expires_at,
                    created_at: now,
                },
            )
            .await?;

        let link = self.config.magic_link_url(&token);
        self.email.send_magic_link(email, &link, expires_at).await?;

        tracing::info!(user_id = %user_id, expires_at = %expires_at, "Issued magic link");
        Ok(IssuedLink {
            link,
            token,
            expires_at,
        })
    }

    /// Consume a magic link token.
    ///
    /// A successful login clears the request counter for the token's email.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` if the token is unknown, used or
    /// expired.
    pub async fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<MagicLinkToken> {
        if token.is_empty() {
            return Err(AuthError::InvalidToken);
        }
        let link = self
            .tokens
            .consume(&hash_token(token), now)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        if let Err(err) = self.limiter.reset(&throttle_key(&link.email)).await {
            tracing::warn!(user_id = %link.user_id, error = %err, "Failed to clear magic link rate limit");
        }
        Ok(link)
    }

    /// Start a session for a verified account.
    ///
    /// # Errors
    ///
    /// Returns error if the session cannot be stored.
    pub async fn open_session(&self, user_id: UserId, email: &str, now: DateTime<Utc>) -> Result<Session> {
        let session = Session::start(user_id, email, now, self.config.session_ttl);
        self.sessions.create_session(&session).await?;
        Ok(session)
    }

    /// Resolve a bearer token to its session.
    ///
    /// # Errors
    ///
    /// - `AuthError::Unauthorized` if the token is not a session id
    /// - `AuthError::SessionNotFound` / `AuthError::SessionExpired`
    pub async fn authenticate(&self, bearer: &str, now: DateTime<Utc>) -> Result<Session> {
        let session_id: SessionId = bearer.parse().map_err(|_| AuthError::Unauthorized)?;
        self.sessions.get_session(session_id, now).await
    }

    /// End one session.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails.
    pub async fn logout(&self, session_id: SessionId) -> Result<()> {
        self.sessions.delete_session(session_id).await
    }

    /// End every session of an account.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails.
    pub async fn revoke_all(&self, user_id: UserId) -> Result<usize> {
        self.sessions.delete_user_sessions(user_id).await
    }
}

fn throttle_key(email: &str) -> String {
    format!("magic_link:{email}")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mocks::{MockEmailProvider, MockRateLimiter, MockSessionStore, MockTokenStore};

    fn links(email: &MockEmailProvider) -> MagicLinks {
        MagicLinks::new(
            AuthConfig::new("https://edumarket.example").with_rate_limit(2, std::time::Duration::from_secs(60)),
            Arc::new(MockTokenStore::new()),
            Arc::new(MockSessionStore::new()),
            Arc::new(MockRateLimiter::new()),
            Arc::new(email.clone()),
        )
    }

    #[tokio::test]
    async fn test_link_is_single_use() {
        let email = MockEmailProvider::new();
        let auth = links(&email);
        let now = Utc::now();
        let user = UserId::new();

        let issued = auth.issue(user, "ada@example.com", now).await.unwrap();
        assert_eq!(email.last_token_for("ada@example.com").unwrap(), Some(issued.token.clone()));

        let verified = auth.verify(&issued.token, now).await.unwrap();
        assert_eq!(verified.user_id, user);
        assert_eq!(auth.verify(&issued.token, now).await, Err(AuthError::InvalidToken));
    }

    #[tokio::test]
    async fn test_login_clears_request_limit() {
        let email = MockEmailProvider::new();
        let auth = links(&email);
        let now = Utc::now();

        auth.throttle("ada@example.com").await.unwrap();
        auth.throttle("ada@example.com").await.unwrap();
        assert!(matches!(
            auth.throttle("ada@example.com").await,
            Err(AuthError::RateLimited { .. })
        ));

        let issued = auth.issue(UserId::new(), "ada@example.com", now).await.unwrap();
        auth.verify(&issued.token, now).await.unwrap();
        auth.throttle("ada@example.com").await.unwrap();
    }

    #[tokio::test]
    async fn test_expired_link_rejected() {
        let email = MockEmailProvider::new();
        let auth = links(&email);
        let now = Utc::now();
        let issued = auth.issue(UserId::new(), "ada@example.com", now).await.unwrap();
        let later = now + chrono::Duration::minutes(16);
        assert_eq!(auth.verify(&issued.token, later).await, Err(AuthError::InvalidToken));
    }

    #[tokio::test]
    async fn test_session_round_trip_and_logout() {
        let email = MockEmailProvider::new();
        let auth = links(&email);
        let now = Utc::now();
        let session = auth.open_session(UserId::new(), "ada@example.com", now).await.unwrap();

        let found = auth.authenticate(&session.session_id.to_string(), now).await.unwrap();
        assert_eq!(found, session);
        assert_eq!(auth.authenticate("garbage", now).await, Err(AuthError::Unauthorized));

        auth.logout(session.session_id).await.unwrap();
        assert_eq!(
            auth.authenticate(&session.session_id.to_string(), now).await,
            Err(AuthError::SessionNotFound)
        );
    }

    #[tokio::test]
    async fn test_throttle_per_email() {
        let email = MockEmailProvider::new();
        let auth = links(&email);
        auth.throttle("ada@example.com").await.unwrap();
        auth.throttle("ada@example.com").await.unwrap();
        assert!(matches!(
            auth.throttle("ada@example.com").await,
            Err(AuthError::RateLimited { .. })
        ));
        auth.throttle("grace@example.com").await.unwrap();
    }
}
