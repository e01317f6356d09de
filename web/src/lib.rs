//! Axum integration for Edumarket.
//!
//! This crate holds the HTTP plumbing shared by every Edumarket service:
//!
//! - [`AppError`]: the handler error type, mapping domain and auth failures
//!   to status codes and a `{"code", "message"}` JSON body
//! - [`extractors`]: correlation id, client IP and bearer token
//! - [`middleware`]: correlation-id propagation and the `http_request` span
//! - [`handlers::health`]: liveness and readiness endpoints
//!
//! # Request Flow
//!
//! 1. **Correlation** middleware tags the request and opens its span
//! 2. **Extract** data from the request (JSON, query, bearer token)
//! 3. **Call** the repository or service
//! 4. **Map** the result (or `AppError`) to an HTTP response

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;

// Re-export key types for convenience
pub use error::AppError;
pub use extractors::{BearerToken, ClientIp, CorrelationId};
pub use handlers::health::{ReadinessCheck, health_check, readiness};
pub use middleware::{CORRELATION_ID_HEADER, correlation_id};

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
