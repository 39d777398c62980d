//! Liveness, readiness and component health.

use axum::{http::StatusCode, Json};
use telemetry::{health, metrics, HealthStatus};

use crate::response::HealthResponse;

/// GET /health - Component report; 503 while the store is unreachable.
pub async fn health_handler() -> (StatusCode, Json<HealthResponse>) {
    let report = health().report();
    let code = match report.status {
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
    };

    (
        code,
        Json(HealthResponse {
            status: report.status,
            clickhouse_connected: health().clickhouse.is_healthy(),
            components: report.components,
            pending_enrichment: metrics().pending_enrichment.get(),
        }),
    )
}

/// GET /health/ready
pub async fn ready_handler() -> StatusCode {
    if health().is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// GET /health/live
pub async fn live_handler() -> StatusCode {
    if health().is_alive() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
