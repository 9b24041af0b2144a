//! Worker pool: N poll-process loops over one consumer group.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use stream::{Batch, BatchReader};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::PipelineConfig;
use crate::processor::BatchProcessor;

/// Fixed set of worker loops sharing a batch reader.
///
/// Cancellation is checked between batches, so a batch that has been read
/// is always processed and acknowledged before its loop exits.
pub struct WorkerPool {
    reader: BatchReader,
    processor: Arc<BatchProcessor>,
    config: PipelineConfig,
    token: CancellationToken,
    started: AtomicBool,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    pub fn new(
        reader: BatchReader,
        processor: Arc<BatchProcessor>,
        config: PipelineConfig,
        token: CancellationToken,
    ) -> Self {
        Self {
            reader,
            processor,
            config,
            token,
            started: AtomicBool::new(false),
            handles: Mutex::new(Vec::new()),
        }
    }

    pub fn is_running(&self) -> bool {
        self.started.load(Ordering::SeqCst) && !self.token.is_cancelled()
    }

    /// Launches the worker loops. A second call does nothing.
    pub fn start(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            debug!("Worker pool already started");
            return;
        }

        let mut handles = self.handles.lock();
        for worker_id in 0..self.config.workers {
            let reader = self.reader.clone();
            let processor = self.processor.clone();
            let config = self.config.clone();
            let token = self.token.clone();

            handles.push(tokio::spawn(async move {
                run_worker(worker_id, reader, processor, config, token).await;
            }));
        }

        info!(
            workers = self.config.workers,
            batch_size = self.config.batch_size,
            group = %self.reader.group().name(),
            "Worker pool started"
        );
    }

    /// Cancels the loops and waits for all of them to exit.
    pub async fn stop(&self) {
        self.token.cancel();

        let handles: Vec<_> = std::mem::take(&mut *self.handles.lock());
        if handles.is_empty() {
            return;
        }

        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "Worker task panicked");
            }
        }

        info!("Worker pool stopped");
    }
}

async fn run_worker(
    worker_id: usize,
    reader: BatchReader,
    processor: Arc<BatchProcessor>,
    config: PipelineConfig,
    token: CancellationToken,
) {
    debug!(worker_id = worker_id, "Worker starting");

    while !token.is_cancelled() {
        match reader
            .read_batch(config.batch_size, config.block_timeout())
            .await
        {
            Some(batch) => {
                let Batch { claim, records, .. } = batch;
                let records = records.into_iter().map(|(_, record)| record).collect();
                processor.process(records).await;

                if let Err(e) = reader.group().ack(&claim).await {
                    warn!(worker_id = worker_id, error = %e, "Failed to acknowledge batch");
                }
            }
            None => {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(config.idle_backoff()) => {}
                }
            }
        }
    }

    debug!(worker_id = worker_id, "Worker stopped");
}
