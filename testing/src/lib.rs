//! # Edumarket Testing
//!
//! Testing utilities for the Edumarket marketplace.
//!
//! This crate provides:
//! - [`FixedClock`]: deterministic time
//! - [`InMemoryMarketplace`]: every repository trait over in-process state,
//!   with each workflow applied all-or-nothing
//! - [`fixtures`]: ready-made accounts and catalog items
//! - [`properties`]: proptest strategies for money values
//!
//! ## Example
//!
//! ```
//! use edumarket_core::environment::Clock;
//! use edumarket_testing::{InMemoryMarketplace, fixtures, test_clock};
//!
//! # tokio_test::block_on(async {
//! let store = InMemoryMarketplace::new();
//! let now = test_clock().now();
//! let teacher = fixtures::teacher(&store, "grace@example.com", now).await.unwrap();
//! let course = fixtures::published_course(&store, &teacher, "Compilers", 4_900, now).await.unwrap();
//! assert!(course.is_published());
//! # });
//! ```

use chrono::{DateTime, Utc};
use edumarket_core::environment::Clock;

pub mod fixtures;
pub mod memory;

/// Mock implementations of environment traits.
pub mod mocks {
    use super::{Clock, DateTime, Utc};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use edumarket_testing::mocks::FixedClock;
    /// use edumarket_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// Property-based testing strategies.
pub mod properties {
    use edumarket_core::Money;
    use proptest::prelude::*;

    /// Catalog prices from free up to 10 000.00.
    pub fn prices() -> impl Strategy<Value = Money> {
        (0_u64..=1_000_000).prop_map(Money::from_cents)
    }

    /// Commission rates from 0 % to 100 %.
    pub fn commission_bps() -> impl Strategy<Value = u32> {
        0_u32..=10_000
    }
}

// Re-export commonly used items
pub use memory::InMemoryMarketplace;
pub use mocks::{FixedClock, test_clock};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        let time1 = clock.now();
        let time2 = clock.now();
        assert_eq!(time1, time2);
        assert_eq!(time1.to_rfc3339(), "2025-01-01T00:00:00+00:00");
    }
}
