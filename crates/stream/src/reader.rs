//! Batch reader: the consumer edge of the log.

use inventory_core::{Error, InventoryRecord, Result};
use std::sync::Arc;
use std::time::Duration;
use telemetry::PipelineMetrics;
use tracing::warn;

use crate::group::{Claim, ConsumerGroup};
use crate::log::EntryId;

/// Records claimed by one read, decoded and ready for processing.
#[derive(Debug, Clone)]
pub struct Batch {
    pub claim: Claim,
    pub records: Vec<(EntryId, InventoryRecord)>,
    /// Entries in the claim that failed to decode
    pub malformed: usize,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_records(self) -> Vec<InventoryRecord> {
        self.records.into_iter().map(|(_, record)| record).collect()
    }
}

/// Pulls batches for one consumer group.
#[derive(Clone)]
pub struct BatchReader {
    group: Arc<ConsumerGroup>,
    metrics: Arc<PipelineMetrics>,
}

impl BatchReader {
    pub fn new(group: Arc<ConsumerGroup>, metrics: Arc<PipelineMetrics>) -> Self {
        Self { group, metrics }
    }

    pub fn group(&self) -> &Arc<ConsumerGroup> {
        &self.group
    }

    /// Claims up to `max_count` entries, waiting at most `block`.
    ///
    /// Returns `None` on timeout and on log errors; the caller backs off and
    /// tries again. A claim made entirely of malformed entries still comes
    /// back as a batch so it can be acknowledged.
    pub async fn read_batch(&self, max_count: usize, block: Duration) -> Option<Batch> {
        let claimed = match self.group.claim(max_count, block).await {
            Ok(Some(claimed)) => claimed,
            Ok(None) => return None,
            Err(e) => {
                warn!(group = %self.group.name(), error = %e, "Failed to read from log");
                return None;
            }
        };

        self.metrics.dec_queue_size(claimed.entries.len() as u64);

        let mut records = Vec::with_capacity(claimed.entries.len());
        let mut malformed = 0;
        for (entry_id, entry) in claimed.entries {
            match entry.decode_record() {
                Ok(record) => records.push((entry_id, record)),
                Err(e) => {
                    let err = Error::malformed(entry_id.value(), e.to_string());
                    warn!(
                        entry_id = %entry_id,
                        tenant_id = %entry.tenant_id,
                        error = %err,
                        "Skipping malformed log entry"
                    );
                    self.metrics.malformed_total.inc();
                    malformed += 1;
                }
            }
        }

        Some(Batch {
            claim: claimed.claim,
            records,
            malformed,
        })
    }

    /// Marks a batch as fully processed.
    pub async fn ack(&self, batch: &Batch) -> Result<EntryId> {
        self.group.ack(&batch.claim).await
    }
}
