//! Health check endpoints.
//!
//! These endpoints are used by load balancers and orchestrators to decide
//! whether to route traffic to the instance.

use async_trait::async_trait;
use axum::{Json, http::StatusCode};
use serde::Serialize;
use std::sync::Arc;

/// A dependency that must answer before the service takes traffic.
#[async_trait]
pub trait ReadinessCheck: Send + Sync {
    /// Component name shown in the readiness report.
    fn component(&self) -> &'static str;

    /// Probe the dependency.
    ///
    /// # Errors
    ///
    /// Returns a short description of the failure.
    async fn check(&self) -> Result<(), String>;
}

/// Result of one readiness probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentHealth {
    /// Component name
    pub component: &'static str,
    /// `"up"` or `"down"`
    pub status: &'static str,
    /// Failure description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Aggregated readiness report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadinessReport {
    /// `"ready"` when every component is up
    pub status: &'static str,
    /// Per-component results
    pub checks: Vec<ComponentHealth>,
}

/// Liveness probe.
///
/// Returns 200 OK while the process is serving requests. Does NOT check
/// dependencies.
///
/// ```text
/// GET /health
/// ```
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

/// Run every readiness probe.
///
/// # Status Codes
///
/// - 200 OK: every component is up
/// - 503 Service Unavailable: at least one component is down
pub async fn readiness(checks: &[Arc<dyn ReadinessCheck>]) -> (StatusCode, Json<ReadinessReport>) {
    let mut results = Vec::with_capacity(checks.len());
    for check in checks {
        let result = match check.check().await {
            Ok(()) => ComponentHealth {
                component: check.component(),
                status: "up",
                message: None,
            },
            Err(message) => {
                tracing::warn!(component = check.component(), error = %message, "Readiness check failed");
                ComponentHealth {
                    component: check.component(),
                    status: "down",
                    message: Some(message),
                }
            }
        };
        results.push(result);
    }

    let ready = results.iter().all(|c| c.status == "up");
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(ReadinessReport {
            status: if ready { "ready" } else { "not_ready" },
            checks: results,
        }),
    )
}
