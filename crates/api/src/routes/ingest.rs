//! Inventory ingestion endpoint.
//!
//! Accepts records in 3 formats:
//! 1. Array: `[record, record, ...]`
//! 2. Object with records: `{ "records": [...] }`
//! 3. Single record: `{ "tenant_id": "...", "agent_id": "...", ... }`

use axum::{body::Bytes, extract::State, Json};
use inventory_core::{limits::MAX_PAYLOAD_SIZE_BYTES, InventoryRecord};
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::response::{ApiError, IngestResponse};
use crate::state::AppState;

/// Request body shapes accepted by the ingest endpoint.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum InventoryPayload {
    Batch(Vec<InventoryRecord>),
    Wrapped { records: Vec<InventoryRecord> },
    Single(InventoryRecord),
}

impl InventoryPayload {
    pub fn parse(body: &[u8]) -> Result<Vec<InventoryRecord>, serde_json::Error> {
        let payload: InventoryPayload = serde_json::from_slice(body)?;
        Ok(match payload {
            Self::Batch(records) | Self::Wrapped { records } => records,
            Self::Single(record) => vec![record],
        })
    }
}

/// POST /v1/inventory - Validates records and appends them to the log.
///
/// Valid records are accepted even when others in the same request are
/// rejected. The request fails only when nothing was accepted.
pub async fn ingest_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<IngestResponse>, ApiError> {
    if body.len() > MAX_PAYLOAD_SIZE_BYTES {
        return Err(ApiError::payload_too_large(format!(
            "Payload size {}KB exceeds {}KB limit",
            body.len() / 1024,
            MAX_PAYLOAD_SIZE_BYTES / 1024
        )));
    }

    let records = InventoryPayload::parse(&body).map_err(|e| {
        warn!("Failed to parse inventory payload: {}", e);
        ApiError::with_code(
            axum::http::StatusCode::BAD_REQUEST,
            "VALID_002",
            format!("Invalid JSON: {}", e),
        )
    })?;

    if records.is_empty() {
        return Err(ApiError::bad_request("No records in request"));
    }

    if records.len() > state.max_batch_records {
        return Err(ApiError::payload_too_large(format!(
            "Batch has {} records, exceeds {} limit",
            records.len(),
            state.max_batch_records
        )));
    }

    let total = records.len();
    debug!(records = total, payload_size = body.len(), "Received inventory batch");

    let outcome = state.gate.enqueue_many(records).await;

    if outcome.all_rejected() {
        if outcome.append_failures > 0 {
            error!(
                rejected = outcome.rejected.len(),
                append_failures = outcome.append_failures,
                "Log unavailable, batch not enqueued"
            );
            return Err(ApiError::unavailable("Failed to enqueue records")
                .with_details(outcome.rejected));
        }
        return Err(ApiError::validation("VALID_001", outcome.rejected));
    }

    info!(
        accepted = outcome.accepted_count(),
        rejected = outcome.rejected.len(),
        "Inventory batch enqueued"
    );

    Ok(Json(IngestResponse::new(outcome.accepted, outcome.rejected)))
}
