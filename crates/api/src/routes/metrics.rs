//! Metrics snapshot endpoint.

use axum::{extract::State, Json};
use telemetry::MetricsSnapshot;

use crate::state::AppState;

/// GET /metrics - Current counters as JSON.
pub async fn metrics_handler(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}
