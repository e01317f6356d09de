//! Business metrics for the marketplace.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `edumarket_signups_total{role}` - Accounts created by role
//! - `edumarket_orders_total{method}` - Orders fulfilled by payment method
//! - `edumarket_revenue_cents_total` - Gross order value in cents
//! - `edumarket_platform_fees_cents_total` - Platform commission in cents
//! - `edumarket_payments_total{status}` - Gateway payments by outcome
//! - `edumarket_withdrawals_total{status}` - Withdrawals by status

use edumarket_core::model::Order;
use edumarket_core::{Role, WithdrawalStatus};
use metrics::describe_counter;

/// Register metric descriptions. Call once at startup.
pub fn register_business_metrics() {
    describe_counter!("edumarket_signups_total", "Accounts created, by role");
    describe_counter!("edumarket_orders_total", "Orders fulfilled, by payment method (wallet, gateway)");
    describe_counter!("edumarket_revenue_cents_total", "Gross value of fulfilled orders in cents");
    describe_counter!(
        "edumarket_platform_fees_cents_total",
        "Platform commission retained on fulfilled orders in cents"
    );
    describe_counter!(
        "edumarket_payments_total",
        "Gateway payments by status (started, succeeded, failed, duplicate)"
    );
    describe_counter!(
        "edumarket_withdrawals_total",
        "Teacher withdrawals by status (pending, paid, rejected)"
    );

    tracing::info!("Business metrics registered");
}

/// Record a new account.
pub fn record_signup(role: Role) {
    metrics::counter!("edumarket_signups_total", "role" => role.as_str()).increment(1);
}

/// Record a fulfilled order.
pub fn record_order(order: &Order, method: &'static str) {
    metrics::counter!("edumarket_orders_total", "method" => method).increment(1);
    metrics::counter!("edumarket_revenue_cents_total").increment(order.total.cents());
    metrics::counter!("edumarket_platform_fees_cents_total").increment(order.platform_fee.cents());
    tracing::debug!(order_id = %order.id, method, "Recorded order metric");
}

/// Record a gateway payment transition.
pub fn record_payment(status: &'static str) {
    metrics::counter!("edumarket_payments_total", "status" => status).increment(1);
}

/// Record a withdrawal transition.
pub fn record_withdrawal(status: WithdrawalStatus) {
    metrics::counter!("edumarket_withdrawals_total", "status" => status.as_str()).increment(1);
}
