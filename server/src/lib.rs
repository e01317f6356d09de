//! Edumarket - an educational content marketplace
//!
//! Teachers publish courses, books, lectures and quizzes; students buy them
//! from a cart with their wallet or through a hosted payment gateway;
//! guardians buy on behalf of linked students; admins approve teacher
//! withdrawals and watch the dashboard.
//!
//! # Architecture
//!
//! ```text
//!   HTTP (axum)          auth::CurrentUser ── edumarket-auth (magic links, Redis sessions)
//!        │
//!        ▼
//!   api::* handlers ── payment_gateway ── hosted checkout + signed webhook
//!        │
//!        ▼
//!   edumarket-core repository traits
//!        │
//!        ▼
//!   edumarket-postgres (one transaction per workflow)
//! ```
//!
//! # Money Flow
//!
//! ```text
//! checkout ─┬─ wallet  ── debit buyer, credit teachers, grant access   (one transaction)
//!           └─ gateway ── pending payment ── webhook ── same fulfillment (one transaction)
//!
//! teacher share = floor(price * (10_000 - commission_bps) / 10_000)
//! platform fee  = price - teacher share
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod api;
pub mod app;
pub mod auth;
pub mod config;
pub mod metrics;
pub mod payment_gateway;
pub mod server;

pub use app::EdumarketApp;
pub use config::Config;
pub use server::{AppState, CheckoutSettings, build_router};
