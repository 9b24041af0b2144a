//! Enrichment fan-out: one concurrent unit per tenant, lookups bounded by
//! a semaphore shared across every worker.

use inventory_core::{
    DeadLetter, EnrichedResult, Error, FailureStage, Finding, InventoryRecord, Result,
};
use std::sync::Arc;
use telemetry::PipelineMetrics;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

use crate::config::EnrichmentConfig;
use crate::dead_letter::DeadLetterSink;
use crate::grouping::TenantPartition;
use crate::oracle::VulnerabilityOracle;

/// Enriches tenant partitions against a vulnerability oracle.
#[derive(Clone)]
pub struct EnrichmentFanout {
    oracle: Arc<dyn VulnerabilityOracle>,
    dead_letters: Arc<dyn DeadLetterSink>,
    metrics: Arc<PipelineMetrics>,
    permits: Arc<Semaphore>,
    config: EnrichmentConfig,
}

impl EnrichmentFanout {
    pub fn new(
        oracle: Arc<dyn VulnerabilityOracle>,
        dead_letters: Arc<dyn DeadLetterSink>,
        metrics: Arc<PipelineMetrics>,
        config: EnrichmentConfig,
    ) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(config.concurrency.max(1))),
            oracle,
            dead_letters,
            metrics,
            config,
        }
    }

    /// Lookups currently allowed to start.
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    /// Enriches every partition concurrently.
    ///
    /// Results come back partition by partition in input order, and in
    /// record order within each partition.
    pub async fn enrich_partitions(&self, partitions: Vec<TenantPartition>) -> Vec<EnrichedResult> {
        self.enrich_batch(partitions).await.1
    }

    /// Like `enrich_partitions`, but also hands back the records, aligned
    /// index for index with their results.
    ///
    /// A partition whose task panics or is cancelled still yields one
    /// failed result per record, and those records are dead-lettered.
    pub async fn enrich_batch(
        &self,
        partitions: Vec<TenantPartition>,
    ) -> (Vec<InventoryRecord>, Vec<EnrichedResult>) {
        let mut tasks = JoinSet::new();
        let mut pending: Vec<(String, Arc<Vec<InventoryRecord>>)> =
            Vec::with_capacity(partitions.len());

        for (index, partition) in partitions.into_iter().enumerate() {
            let records = Arc::new(partition.records);
            pending.push((partition.tenant_id.clone(), records.clone()));

            let fanout = self.clone();
            let tenant_id = partition.tenant_id;
            tasks.spawn(async move { (index, fanout.enrich(&tenant_id, &records).await) });
        }

        let mut ordered: Vec<Option<Vec<EnrichedResult>>> = vec![None; pending.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, results)) => ordered[index] = Some(results),
                Err(e) => {
                    error!(error = %e, "Enrichment task failed");
                    self.metrics.inc_errors(1);
                }
            }
        }

        let mut records = Vec::new();
        let mut results = Vec::new();
        for ((tenant_id, partition), enriched) in pending.into_iter().zip(ordered) {
            let partition = Arc::try_unwrap(partition).unwrap_or_else(|shared| (*shared).clone());
            let enriched = match enriched {
                Some(enriched) => enriched,
                None => self.abandon(&tenant_id, &partition).await,
            };
            records.extend(partition);
            results.extend(enriched);
        }

        (records, results)
    }

    /// Fails every record of a partition whose task never returned.
    async fn abandon(&self, tenant_id: &str, records: &[InventoryRecord]) -> Vec<EnrichedResult> {
        let reason = "enrichment task aborted";
        let results = records
            .iter()
            .map(|r| EnrichedResult::failed(r, reason))
            .collect();
        let letters = records
            .iter()
            .map(|r| DeadLetter::new(r.clone(), FailureStage::Enrichment, reason, 0))
            .collect();
        self.route(tenant_id, letters).await;
        results
    }

    async fn route(&self, tenant_id: &str, letters: Vec<DeadLetter>) {
        if letters.is_empty() {
            return;
        }
        let count = letters.len() as u64;
        match self.dead_letters.route(letters).await {
            Ok(()) => self.metrics.dead_lettered_total.inc_by(count),
            Err(e) => {
                error!(tenant_id = %tenant_id, count = count, error = %e, "Failed to route dead letters");
                self.metrics.inc_errors(1);
            }
        }
    }

    /// Enriches one tenant's records, one result per record in input order.
    ///
    /// Records whose lookups exhaust the retry budget yield a failed result
    /// and are dead-lettered.
    pub async fn enrich(&self, tenant_id: &str, records: &[InventoryRecord]) -> Vec<EnrichedResult> {
        let mut results = Vec::with_capacity(records.len());
        let mut letters = Vec::new();

        for record in records {
            match self.lookup_with_retry(record).await {
                Ok(findings) => results.push(EnrichedResult::enriched(record, findings)),
                Err((err, attempts)) => {
                    warn!(
                        tenant_id = %tenant_id,
                        record_id = %record.id,
                        name = %record.name,
                        version = %record.version,
                        attempts = attempts,
                        error = %err,
                        "Enrichment failed"
                    );
                    self.metrics.inc_errors(1);
                    results.push(EnrichedResult::failed(record, err.to_string()));
                    letters.push(DeadLetter::new(
                        record.clone(),
                        FailureStage::Enrichment,
                        err.to_string(),
                        attempts,
                    ));
                }
            }
        }

        self.route(tenant_id, letters).await;

        debug!(tenant_id = %tenant_id, count = results.len(), "Tenant partition enriched");
        results
    }

    /// Looks up one record, retrying with linear backoff.
    ///
    /// The permit is held only for the lookup itself, not the backoff.
    async fn lookup_with_retry(
        &self,
        record: &InventoryRecord,
    ) -> std::result::Result<Vec<Finding>, (Error, u32)> {
        let attempts = self.config.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 0..attempts {
            if attempt > 0 {
                let backoff = self.config.retry_backoff() * attempt;
                debug!(
                    record_id = %record.id,
                    attempt = attempt,
                    backoff_ms = %backoff.as_millis(),
                    "Retrying enrichment lookup"
                );
                tokio::time::sleep(backoff).await;
            }

            match self.lookup_once(record).await {
                Ok(findings) => return Ok(findings),
                Err(e) => last_error = Some(e),
            }
        }

        let err = last_error.unwrap_or_else(|| {
            Error::enrichment(&record.name, &record.version, "lookup failed with unknown error")
        });
        Err((err, attempts))
    }

    async fn lookup_once(&self, record: &InventoryRecord) -> Result<Vec<Finding>> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| Error::internal("enrichment semaphore closed"))?;

        let timeout = self.config.lookup_timeout();
        match tokio::time::timeout(
            timeout,
            self.oracle
                .lookup_vulnerabilities(&record.name, &record.version),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(Error::enrichment(
                &record.name,
                &record.version,
                format!("lookup timed out after {}ms", timeout.as_millis()),
            )),
        }
    }
}
