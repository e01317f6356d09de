//! # Edumarket Core
//!
//! Domain types and pure business rules for the Edumarket marketplace.
//!
//! The marketplace sells educational content (courses, books, lectures and
//! quizzes) published by teachers to students, and to guardians buying on
//! behalf of the students linked to them. Admins moderate the catalog, pay
//! out teacher withdrawals and read the reporting dashboard.
//!
//! ## Layout
//!
//! - [`types`]: identifiers and enumerations stored as text in the database
//! - [`money`]: integer-cents [`Money`]
//! - [`model`]: entities returned by the repositories
//! - [`pricing`], [`access`], [`quiz`], [`validation`]: pure policies
//! - [`repository`]: async traits implemented by the `PostgreSQL` and
//!   in-memory backends
//!
//! Every workflow that touches more than one row is a single repository
//! method, so a backend can run it inside one database transaction.
//!
//! ## Example
//!
//! ```
//! use edumarket_core::money::Money;
//! use edumarket_core::pricing::RevenueSplit;
//!
//! let split = RevenueSplit::compute(Money::from_cents(2_999), 2_000);
//! assert_eq!(split.teacher_share, Money::from_cents(2_399));
//! assert_eq!(split.platform_fee, Money::from_cents(600));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod access;
pub mod environment;
pub mod error;
pub mod model;
pub mod money;
pub mod paging;
pub mod pricing;
pub mod quiz;
pub mod repository;
pub mod types;
pub mod validation;

pub use error::{MarketError, Result};
pub use money::Money;
pub use paging::{Page, PageRequest};
pub use types::*;

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
