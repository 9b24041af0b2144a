//! Health check endpoints.

use axum::{extract::State, http::StatusCode, Json};

use crate::response::HealthResponse;
use crate::state::AppState;

/// GET /health - Full health check.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    state.refresh_health().await;
    let report = state.health.report();

    Json(HealthResponse {
        status: format!("{:?}", report.status).to_lowercase(),
        log_backend: state.gate.log().backend().to_string(),
        log_connected: state.health.log.is_healthy(),
        result_store_connected: state.health.result_store.is_healthy(),
        queue_size: state.metrics.queue_size.get(),
    })
}

/// GET /health/ready - Readiness probe (can accept records).
pub async fn ready_handler(State(state): State<AppState>) -> StatusCode {
    state.refresh_health().await;
    if state.health.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// GET /health/live - Liveness probe (service is running).
pub async fn live_handler(State(state): State<AppState>) -> StatusCode {
    if state.health.is_alive() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
