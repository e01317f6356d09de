//! Health check endpoints.

use super::state::AppState;
use async_trait::async_trait;
use axum::{Json, extract::State, http::StatusCode};
use edumarket_core::repository::ReportRepository;
use edumarket_web::ReadinessCheck;
use edumarket_web::handlers::health::ReadinessReport;
use std::sync::Arc;

/// Liveness probe.
///
/// ```text
/// GET /health
/// ```
pub async fn health_check() -> (StatusCode, &'static str) {
    edumarket_web::health_check().await
}

/// Readiness probe: every dependency must answer.
///
/// ```text
/// GET /ready
/// ```
pub async fn readiness_check(State(state): State<AppState>) -> (StatusCode, Json<ReadinessReport>) {
    edumarket_web::readiness(&state.readiness).await
}

/// Pings the marketplace database.
pub struct DatabaseCheck {
    reports: Arc<dyn ReportRepository>,
}

impl DatabaseCheck {
    /// Probe `reports`.
    #[must_use]
    pub fn new(reports: Arc<dyn ReportRepository>) -> Self {
        Self { reports }
    }
}

#[async_trait]
impl ReadinessCheck for DatabaseCheck {
    fn component(&self) -> &'static str {
        "database"
    }

    async fn check(&self) -> Result<(), String> {
        self.reports.ping().await.map_err(|e| e.to_string())
    }
}
