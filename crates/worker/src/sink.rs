//! Result sink: persists enriched results with a retry budget.

use async_trait::async_trait;
use inventory_core::{
    DeadLetter, EnrichedResult, Error, FailureStage, InventoryRecord, Result, ResultStore,
};
use parking_lot::Mutex;
use std::sync::Arc;
use telemetry::PipelineMetrics;
use tracing::{error, info, warn};

use crate::config::SinkConfig;
use crate::dead_letter::DeadLetterSink;

/// Writes batches of results to a `ResultStore`.
///
/// A batch that still fails after `max_attempts` counts as one error and
/// its records are dead-lettered, except those whose enrichment already
/// failed: they were dead-lettered by the fan-out. Partial writes are not
/// rolled back.
pub struct ResultSink {
    store: Arc<dyn ResultStore>,
    dead_letters: Arc<dyn DeadLetterSink>,
    metrics: Arc<PipelineMetrics>,
    config: SinkConfig,
}

impl ResultSink {
    pub fn new(
        store: Arc<dyn ResultStore>,
        dead_letters: Arc<dyn DeadLetterSink>,
        metrics: Arc<PipelineMetrics>,
        config: SinkConfig,
    ) -> Self {
        Self {
            store,
            dead_letters,
            metrics,
            config,
        }
    }

    pub fn store(&self) -> &Arc<dyn ResultStore> {
        &self.store
    }

    /// Persists `results`, the enrichment output for `records`.
    ///
    /// `records[i]` must be the record `results[i]` was built from.
    pub async fn store_results(
        &self,
        records: &[InventoryRecord],
        results: &[EnrichedResult],
    ) -> Result<()> {
        if results.is_empty() {
            return Ok(());
        }

        let attempts = self.config.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 0..attempts {
            if attempt > 0 {
                let backoff = self.config.retry_backoff() * attempt;
                warn!(
                    attempt = attempt,
                    backoff_ms = %backoff.as_millis(),
                    "Retrying result persist"
                );
                tokio::time::sleep(backoff).await;
            }

            match self.store.persist(results).await {
                Ok(()) => return Ok(()),
                Err(e) => last_error = Some(e),
            }
        }

        let err = last_error.unwrap_or_else(|| Error::persist("persist failed with unknown error"));
        error!(
            count = results.len(),
            attempts = attempts,
            error = %err,
            "Failed to persist results after retries"
        );
        self.metrics.inc_errors(1);

        let reason = err.to_string();
        let letters: Vec<DeadLetter> = records
            .iter()
            .zip(results)
            .filter(|(_, result)| !result.is_error())
            .map(|(r, _)| DeadLetter::new(r.clone(), FailureStage::Persist, reason.clone(), attempts))
            .collect();
        if letters.is_empty() {
            return Err(err);
        }
        let count = letters.len() as u64;
        match self.dead_letters.route(letters).await {
            Ok(()) => self.metrics.dead_lettered_total.inc_by(count),
            Err(e) => {
                error!(count = count, error = %e, "Failed to route dead letters");
                self.metrics.inc_errors(1);
            }
        }

        Err(err)
    }
}

/// Results kept in memory, for tests.
#[derive(Debug, Default)]
pub struct MemoryResultStore {
    results: Mutex<Vec<EnrichedResult>>,
}

impl MemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn results(&self) -> Vec<EnrichedResult> {
        self.results.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.results.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.lock().is_empty()
    }
}

#[async_trait]
impl ResultStore for MemoryResultStore {
    async fn persist(&self, results: &[EnrichedResult]) -> Result<()> {
        self.results.lock().extend_from_slice(results);
        Ok(())
    }
}

/// Store that only logs each result; used when no database is configured.
#[derive(Debug, Default)]
pub struct LoggingResultStore;

#[async_trait]
impl ResultStore for LoggingResultStore {
    async fn persist(&self, results: &[EnrichedResult]) -> Result<()> {
        for result in results {
            info!(
                tenant_id = %result.tenant_id,
                agent_id = %result.agent_id,
                record_id = %result.record_id,
                findings = result.findings.len(),
                max_severity = result.max_severity().map(|s| s.as_str()).unwrap_or("none"),
                error = result.error.as_deref().unwrap_or(""),
                "Enriched result"
            );
        }
        Ok(())
    }
}
