//! Application state shared across handlers.

use inventory_core::ResultStore;
use std::sync::Arc;
use stream::EnqueueGate;
use telemetry::{HealthRegistry, PipelineMetrics};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    /// Writes records to the log
    pub gate: EnqueueGate,
    /// Probed by the health endpoints
    pub result_store: Arc<dyn ResultStore>,
    pub metrics: Arc<PipelineMetrics>,
    pub health: Arc<HealthRegistry>,
    /// Records accepted per request
    pub max_batch_records: usize,
}

impl AppState {
    pub fn new(
        gate: EnqueueGate,
        result_store: Arc<dyn ResultStore>,
        metrics: Arc<PipelineMetrics>,
        health: Arc<HealthRegistry>,
    ) -> Self {
        Self {
            gate,
            result_store,
            metrics,
            health,
            max_batch_records: inventory_core::limits::MAX_BATCH_RECORDS,
        }
    }

    pub fn with_max_batch_records(mut self, max_batch_records: usize) -> Self {
        self.max_batch_records = max_batch_records;
        self
    }

    /// Probes the log and result store, recording the outcome.
    pub async fn refresh_health(&self) {
        let log = self.gate.log();
        self.health
            .log
            .record(log.health_check().await, &format!("{} log unreachable", log.backend()));
        self.health
            .result_store
            .record(self.result_store.is_healthy().await, "result store unreachable");
    }
}
