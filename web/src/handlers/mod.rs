//! Generic HTTP handlers.

pub mod health;
