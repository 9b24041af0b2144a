//! API routes.

pub mod health;
pub mod ingest;
pub mod metrics;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use inventory_core::limits::MAX_PAYLOAD_SIZE_BYTES;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::state::AppState;

/// Creates the API router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/v1/inventory", post(ingest::ingest_handler))
        .route("/health", get(health::health_handler))
        .route("/health/ready", get(health::ready_handler))
        .route("/health/live", get(health::live_handler))
        .route("/metrics", get(metrics::metrics_handler))
        // Oversized bodies reach the handler so it can answer with a 413 body.
        .layer(DefaultBodyLimit::max(MAX_PAYLOAD_SIZE_BYTES * 2))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
