//! Retention trimmer: caps the log length and rolls the daily counter.

use inventory_core::Result;
use std::sync::Arc;
use stream::StreamLog;
use telemetry::PipelineMetrics;
use tracing::{error, info};

/// Keeps the log at or below `max_entries`.
pub struct RetentionTrimmer {
    log: Arc<dyn StreamLog>,
    metrics: Arc<PipelineMetrics>,
    max_entries: u64,
}

impl RetentionTrimmer {
    pub fn new(log: Arc<dyn StreamLog>, metrics: Arc<PipelineMetrics>, max_entries: u64) -> Self {
        Self {
            log,
            metrics,
            max_entries,
        }
    }

    /// One retention pass: trim the log, then reset the daily counter.
    ///
    /// The daily reset happens even when the trim fails; the trim is simply
    /// attempted again on the next pass.
    pub async fn run_once(&self) -> Result<u64> {
        let outcome = self.log.trim(self.max_entries).await;

        match &outcome {
            Ok(removed) => {
                self.metrics.trimmed_total.inc_by(*removed);
                info!(
                    removed = *removed,
                    max_entries = self.max_entries,
                    backend = self.log.backend(),
                    "Trimmed log"
                );
            }
            Err(e) => {
                error!(max_entries = self.max_entries, error = %e, "Failed to trim log");
            }
        }

        let processed_today = self.metrics.reset_daily();
        info!(processed_today = processed_today, "Reset daily metrics");

        outcome
    }
}
