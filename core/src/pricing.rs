//! Cart totals and revenue sharing.

use crate::error::{MarketError, Result};
use crate::model::{CartLine, CheckoutLine, OrderItem};
use crate::money::{BPS_SCALE, Money};
use serde::Serialize;

/// Totals for a cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CartSummary {
    /// Number of lines
    pub item_count: u32,
    /// Sum of line prices
    pub subtotal: Money,
}

impl CartSummary {
    /// Summarize checkout-ready lines.
    ///
    /// # Errors
    ///
    /// - [`MarketError::Validation`] if a line is no longer published
    /// - [`MarketError::Internal`] if the subtotal overflows
    pub fn from_lines(lines: &[CartLine]) -> Result<Self> {
        if let Some(line) = lines.iter().find(|l| l.status != crate::ContentStatus::Published) {
            return Err(MarketError::validation(format!(
                "'{}' is no longer available",
                line.title
            )));
        }
        let subtotal = total_of(lines.iter().map(|l| l.price))?;
        Ok(Self {
            item_count: u32::try_from(lines.len()).map_err(|_| MarketError::validation("too many items"))?,
            subtotal,
        })
    }

    /// Summarize lines for display, ignoring availability.
    #[must_use]
    pub fn preview(lines: &[CartLine]) -> Self {
        Self {
            item_count: u32::try_from(lines.len()).unwrap_or(u32::MAX),
            subtotal: lines.iter().map(|l| l.price).sum(),
        }
    }
}

/// Overflow-checked sum.
///
/// # Errors
///
/// Returns [`MarketError::Internal`] if the total does not fit in a `u64`.
pub fn total_of(amounts: impl IntoIterator<Item = Money>) -> Result<Money> {
    amounts
        .into_iter()
        .try_fold(Money::ZERO, Money::checked_add)
        .ok_or_else(|| MarketError::Internal("money overflow".into()))
}

/// How a sale price is shared between teacher and platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RevenueSplit {
    /// Credited to the teacher
    pub teacher_share: Money,
    /// Kept by the platform
    pub platform_fee: Money,
}

impl RevenueSplit {
    /// Split `price` for a platform commission of `commission_bps`.
    ///
    /// The teacher share is rounded down and the platform keeps the
    /// remainder, so the two always add up to `price`.
    #[must_use]
    pub const fn compute(price: Money, commission_bps: u32) -> Self {
        let commission = if commission_bps as u64 > BPS_SCALE {
            BPS_SCALE
        } else {
            commission_bps as u64
        };
        #[allow(clippy::cast_possible_truncation)]
        let (teacher_share, platform_fee) = price.split_bps((BPS_SCALE - commission) as u32);
        Self {
            teacher_share,
            platform_fee,
        }
    }
}

/// Build order items with their split from checkout lines.
#[must_use]
pub fn order_items(lines: &[CheckoutLine], commission_bps: u32) -> Vec<OrderItem> {
    lines
        .iter()
        .map(|line| {
            let split = RevenueSplit::compute(line.price, commission_bps);
            OrderItem {
                content_id: line.content_id,
                teacher_id: line.teacher_id,
                price: line.price,
                teacher_share: split.teacher_share,
                platform_fee: split.platform_fee,
            }
        })
        .collect()
}
