//! Money value object.
//!
//! Amounts are whole cents in a `u64`; there is no floating point anywhere in
//! the pricing path. The storage layer keeps cents in `BIGINT` columns, hence
//! the [`Money::to_db`] / [`Money::from_db`] conversions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;

/// Basis points in one whole (100 %).
pub const BPS_SCALE: u64 = 10_000;

/// Represents money in cents to avoid floating-point arithmetic errors
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(u64);

impl Money {
    /// Zero cents
    pub const ZERO: Self = Self(0);

    /// Creates a `Money` value from cents
    #[must_use]
    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    /// Returns the amount in cents
    #[must_use]
    pub const fn cents(&self) -> u64 {
        self.0
    }

    /// Checks if the amount is zero
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Adds two money amounts with overflow checking
    #[must_use]
    pub const fn checked_add(self, other: Self) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(result) => Some(Self(result)),
            None => None,
        }
    }

    /// Subtracts two money amounts (returns None if result would be negative)
    #[must_use]
    pub const fn checked_sub(self, other: Self) -> Option<Self> {
        match self.0.checked_sub(other.0) {
            Some(result) => Some(Self(result)),
            None => None,
        }
    }

    /// Splits the amount by a basis-point rate.
    ///
    /// Returns `(portion, remainder)` where `portion` is
    /// `floor(amount * bps / 10_000)` and the two halves always add up to the
    /// original amount. Rates above 100 % are clamped.
    #[must_use]
    pub const fn split_bps(self, bps: u32) -> (Self, Self) {
        let bps = if (bps as u64) > BPS_SCALE { BPS_SCALE } else { bps as u64 };
        // u128 keeps the intermediate product exact for every u64 amount
        #[allow(clippy::cast_possible_truncation)]
        let portion = ((self.0 as u128 * bps as u128) / BPS_SCALE as u128) as u64;
        (Self(portion), Self(self.0 - portion))
    }

    /// Converts to the signed representation used by `BIGINT` columns.
    ///
    /// Returns `None` above `i64::MAX` cents.
    #[must_use]
    pub fn to_db(self) -> Option<i64> {
        i64::try_from(self.0).ok()
    }

    /// Reads a `BIGINT` column; negative values are rejected.
    #[must_use]
    pub fn from_db(cents: i64) -> Option<Self> {
        u64::try_from(cents).ok().map(Self)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl Sum for Money {
    /// Saturates instead of overflowing; callers that need overflow
    /// detection fold with [`Money::checked_add`].
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        Self(iter.fold(0_u64, |acc, m| acc.saturating_add(m.0)))
    }
}
