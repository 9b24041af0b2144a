//! Per-batch processing: grouping → enrichment fan-out → result sink.

use inventory_core::InventoryRecord;
use std::sync::Arc;
use std::time::Instant;
use telemetry::PipelineMetrics;
use tracing::debug;

use crate::fanout::EnrichmentFanout;
use crate::grouping::group_by_tenant;
use crate::sink::ResultSink;

/// Runs one decoded batch through the pipeline stages.
pub struct BatchProcessor {
    fanout: EnrichmentFanout,
    sink: ResultSink,
    metrics: Arc<PipelineMetrics>,
}

impl BatchProcessor {
    pub fn new(fanout: EnrichmentFanout, sink: ResultSink, metrics: Arc<PipelineMetrics>) -> Self {
        Self {
            fanout,
            sink,
            metrics,
        }
    }

    pub fn sink(&self) -> &ResultSink {
        &self.sink
    }

    /// Processes a batch and returns how many records it held.
    ///
    /// Per-record and persist failures are counted and dead-lettered
    /// downstream; they never fail the batch.
    pub async fn process(&self, records: Vec<InventoryRecord>) -> usize {
        if records.is_empty() {
            return 0;
        }

        let start = Instant::now();
        let count = records.len();

        let partitions = group_by_tenant(records);
        let tenants = partitions.len();
        let (records, results) = self.fanout.enrich_batch(partitions).await;

        // Failure is already counted and dead-lettered by the sink.
        let _ = self.sink.store_results(&records, &results).await;

        self.metrics.inc_processed(count as u64);
        self.metrics.batches_total.inc();
        self.metrics
            .batch_latency_ms
            .observe(start.elapsed().as_millis() as u64);

        debug!(
            count = count,
            tenants = tenants,
            latency_ms = %start.elapsed().as_millis(),
            "Processed batch"
        );

        count
    }
}
