//! Error types for marketplace operations.

use thiserror::Error;

/// Result type alias for marketplace operations.
pub type Result<T> = std::result::Result<T, MarketError>;

/// Failure modes shared by the domain policies and the repositories.
///
/// Variants are coarse on purpose: the web layer maps each one to exactly one
/// HTTP status.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MarketError {
    // ═══════════════════════════════════════════════════════════
    // Lookup and permission
    // ═══════════════════════════════════════════════════════════

    /// Requested resource does not exist (or is hidden from the caller).
    #[error("{resource} with id {id} not found")]
    NotFound {
        /// Resource kind, e.g. `"Content"`
        resource: &'static str,
        /// Identifier as rendered in the request
        id: String,
    },

    /// Caller is authenticated but not allowed to do this.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    // ═══════════════════════════════════════════════════════════
    // Input and state
    // ═══════════════════════════════════════════════════════════

    /// Request data failed validation.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Request conflicts with existing data (duplicate, already owned, ...).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Entity is not in a state that allows the requested change.
    #[error("Cannot move {entity} from {from} to {to}")]
    InvalidTransition {
        /// Entity kind
        entity: &'static str,
        /// Current state
        from: String,
        /// Requested state
        to: String,
    },

    /// Wallet balance does not cover the amount.
    #[error("Insufficient funds: balance {balance_cents} cents, required {required_cents} cents")]
    InsufficientFunds {
        /// Current balance
        balance_cents: u64,
        /// Amount needed
        required_cents: u64,
    },

    // ═══════════════════════════════════════════════════════════
    // System
    // ═══════════════════════════════════════════════════════════

    /// Storage backend failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Invariant broken inside the service (should not be exposed to users).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl MarketError {
    /// Shorthand for [`MarketError::NotFound`].
    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    /// Shorthand for [`MarketError::Validation`].
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Shorthand for [`MarketError::Conflict`].
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// Shorthand for [`MarketError::Forbidden`].
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    /// Returns `true` if the error was caused by the caller's input or state.
    ///
    /// # Examples
    ///
    /// ```
    /// # use edumarket_core::MarketError;
    /// assert!(MarketError::validation("rating out of range").is_client_error());
    /// assert!(!MarketError::Storage("connection reset".into()).is_client_error());
    /// ```
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        !matches!(self, Self::Storage(_) | Self::Internal(_))
    }
}

impl From<crate::types::ParseEnumError> for MarketError {
    fn from(err: crate::types::ParseEnumError) -> Self {
        Self::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message() {
        let err = MarketError::not_found("Content", "abc");
        assert_eq!(err.to_string(), "Content with id abc not found");
    }

    #[test]
    fn test_insufficient_funds_message() {
        let err = MarketError::InsufficientFunds {
            balance_cents: 100,
            required_cents: 250,
        };
        assert!(err.to_string().contains("required 250"));
        assert!(err.is_client_error());
    }
}
