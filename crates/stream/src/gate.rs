//! Enqueue gate: the only writer of inventory records into the log.

use chrono::Utc;
use inventory_core::{Error, InventoryRecord, Result};
use serde::Serialize;
use std::sync::Arc;
use telemetry::PipelineMetrics;
use tracing::{debug, error, warn};

use crate::log::{LogEntry, StreamLog};

/// Per-record outcome of a multi-record enqueue.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EnqueueOutcome {
    /// IDs of accepted records, in input order
    pub accepted: Vec<String>,
    /// One message per rejected record, prefixed with its input index
    pub rejected: Vec<String>,
    /// Rejections caused by the log rather than the record itself
    pub append_failures: usize,
}

impl EnqueueOutcome {
    pub fn accepted_count(&self) -> usize {
        self.accepted.len()
    }

    pub fn all_rejected(&self) -> bool {
        self.accepted.is_empty() && !self.rejected.is_empty()
    }
}

/// Validates records, fills in defaults, and appends them to the log.
#[derive(Clone)]
pub struct EnqueueGate {
    log: Arc<dyn StreamLog>,
    metrics: Arc<PipelineMetrics>,
}

impl EnqueueGate {
    pub fn new(log: Arc<dyn StreamLog>, metrics: Arc<PipelineMetrics>) -> Self {
        Self { log, metrics }
    }

    pub fn log(&self) -> &Arc<dyn StreamLog> {
        &self.log
    }

    /// Enqueues one record and returns its (possibly generated) ID.
    ///
    /// Nothing is retried here; append failures go straight back to the
    /// caller.
    pub async fn enqueue(&self, record: InventoryRecord) -> Result<String> {
        let record = record.normalize(Utc::now())?;
        let entry = LogEntry::from_record(&record)?;

        let entry_id = self.log.append(entry).await.map_err(|e| {
            error!(
                tenant_id = %record.tenant_id,
                record_id = %record.id,
                error = %e,
                "Failed to append record"
            );
            match e {
                Error::Append(_) => e,
                other => Error::append(other.to_string()),
            }
        })?;

        self.metrics.inc_queue_size();

        debug!(
            tenant_id = %record.tenant_id,
            record_id = %record.id,
            entry_id = %entry_id,
            "Record enqueued"
        );

        Ok(record.id)
    }

    /// Enqueues each record independently.
    pub async fn enqueue_many(&self, records: Vec<InventoryRecord>) -> EnqueueOutcome {
        let mut outcome = EnqueueOutcome::default();

        for (index, record) in records.into_iter().enumerate() {
            match self.enqueue(record).await {
                Ok(id) => outcome.accepted.push(id),
                Err(e) => {
                    if matches!(e, Error::Append(_)) {
                        outcome.append_failures += 1;
                    }
                    warn!(index = index, error = %e, "Record rejected");
                    outcome.rejected.push(format!("record {}: {}", index, e));
                }
            }
        }

        outcome
    }
}
