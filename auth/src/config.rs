//! Authentication configuration.

use chrono::Duration;

/// Magic link and session settings.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Frontend URL that receives the token.
    ///
    /// Magic links are formatted as `{base_url}/auth/verify?token={token}`.
    pub base_url: String,

    /// Lifetime of a session.
    ///
    /// Default: 7 days
    pub session_ttl: Duration,

    /// Lifetime of a magic link token.
    ///
    /// Default: 15 minutes
    pub magic_link_ttl: Duration,

    /// Magic links allowed per email within `rate_limit_window`.
    ///
    /// Default: 5
    pub rate_limit_requests: u32,

    /// Sliding window for `rate_limit_requests`.
    ///
    /// Default: 5 minutes
    pub rate_limit_window: std::time::Duration,

    /// Return the magic link in API responses (never enable in production).
    pub expose_magic_links: bool,
}

impl AuthConfig {
    /// Create a configuration with default lifetimes.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Set session lifetime.
    #[must_use]
    pub const fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    /// Set magic link lifetime.
    #[must_use]
    pub const fn with_magic_link_ttl(mut self, ttl: Duration) -> Self {
        self.magic_link_ttl = ttl;
        self
    }

    /// Set the rate limit.
    #[must_use]
    pub const fn with_rate_limit(mut self, requests: u32, window: std::time::Duration) -> Self {
        self.rate_limit_requests = requests;
        self.rate_limit_window = window;
        self
    }

    /// Echo magic links in responses.
    #[must_use]
    pub const fn with_exposed_magic_links(mut self, expose: bool) -> Self {
        self.expose_magic_links = expose;
        self
    }

    /// Build the link a user clicks.
    #[must_use]
    pub fn magic_link_url(&self, token: &str) -> String {
        format!("{}/auth/verify?token={token}", self.base_url.trim_end_matches('/'))
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            session_ttl: Duration::days(7),
            magic_link_ttl: Duration::minutes(15),
            rate_limit_requests: 5,
            rate_limit_window: std::time::Duration::from_secs(300),
            expose_magic_links: false,
        }
    }
}
