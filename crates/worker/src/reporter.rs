//! Periodic metrics reporting.

use clickhouse_client::insert::insert_metrics;
use clickhouse_client::ClickHouseClient;
use std::sync::Arc;
use telemetry::{MetricsSnapshot, PipelineMetrics};
use tracing::{error, info};

/// Logs a metrics snapshot and optionally writes it to ClickHouse.
pub struct MetricsReporter {
    metrics: Arc<PipelineMetrics>,
    clickhouse: Option<ClickHouseClient>,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<PipelineMetrics>) -> Self {
        Self {
            metrics,
            clickhouse: None,
        }
    }

    /// Also flush each snapshot to the `pipeline_metrics` table.
    pub fn with_clickhouse(mut self, client: ClickHouseClient) -> Self {
        self.clickhouse = Some(client);
        self
    }

    pub async fn report_once(&self) -> MetricsSnapshot {
        let snapshot = self.metrics.snapshot();

        info!(
            processed_total = snapshot.processed_total,
            processed_today = snapshot.processed_today,
            errors_total = snapshot.errors_total,
            queue_size = snapshot.queue_size,
            malformed_total = snapshot.malformed_total,
            dead_lettered_total = snapshot.dead_lettered_total,
            batch_latency_mean_ms = snapshot.batch_latency_mean_ms,
            "Pipeline metrics"
        );

        if let Some(ref client) = self.clickhouse {
            if let Err(e) = insert_metrics(client, snapshot.clone()).await {
                error!("Failed to flush metrics: {}", e);
            }
        }

        snapshot
    }
}
