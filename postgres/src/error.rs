//! sqlx error mapping.

use edumarket_core::MarketError;

/// Map a driver error to [`MarketError::Storage`] with some context.
pub(crate) fn storage(context: &'static str) -> impl FnOnce(sqlx::Error) -> MarketError {
    move |e| MarketError::Storage(format!("{context}: {e}"))
}

/// Returns `true` for unique-constraint violations.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// Map a unique violation to `Conflict`, anything else to `Storage`.
pub(crate) fn conflict_or_storage(
    conflict: &'static str,
    context: &'static str,
) -> impl FnOnce(sqlx::Error) -> MarketError {
    move |e| {
        if is_unique_violation(&e) {
            MarketError::conflict(conflict)
        } else {
            MarketError::Storage(format!("{context}: {e}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_keeps_context() {
        let err = storage("Failed to load user")(sqlx::Error::RowNotFound);
        assert!(matches!(err, MarketError::Storage(msg) if msg.starts_with("Failed to load user")));
    }

    #[test]
    fn test_non_database_errors_are_not_conflicts() {
        assert!(!is_unique_violation(&sqlx::Error::PoolTimedOut));
        let err = conflict_or_storage("email taken", "Failed to create user")(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, MarketError::Storage(_)));
    }
}
