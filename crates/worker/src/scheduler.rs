//! Scheduler owning the worker pool and the background loops.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::pool::WorkerPool;
use crate::reporter::MetricsReporter;
use crate::retention::RetentionTrimmer;

/// Background loop intervals.
#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    /// Metrics report interval
    pub report_interval: Duration,
    /// Retention check interval
    pub retention_interval: Duration,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            report_interval: Duration::from_secs(30),
            retention_interval: Duration::from_secs(3600), // 1 hour
        }
    }
}

/// Runs the worker pool, metrics reporter, and retention trimmer under one
/// cancellation token.
pub struct PipelineScheduler {
    pool: Arc<WorkerPool>,
    reporter: Arc<MetricsReporter>,
    trimmer: Arc<RetentionTrimmer>,
    config: ScheduleConfig,
    token: CancellationToken,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl PipelineScheduler {
    /// `token` should be the parent of the pool's token so cancelling it
    /// stops everything.
    pub fn new(
        pool: Arc<WorkerPool>,
        reporter: MetricsReporter,
        trimmer: RetentionTrimmer,
        config: ScheduleConfig,
        token: CancellationToken,
    ) -> Self {
        Self {
            pool,
            reporter: Arc::new(reporter),
            trimmer: Arc::new(trimmer),
            config,
            token,
            handles: Mutex::new(Vec::new()),
        }
    }

    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    /// Starts the pool and both background loops.
    pub fn start(&self) {
        self.pool.start();

        let mut handles = self.handles.lock();

        let reporter = self.reporter.clone();
        let token = self.token.clone();
        let period = self.config.report_interval;
        handles.push(tokio::spawn(async move {
            run_every(period, token, || {
                let reporter = reporter.clone();
                async move {
                    reporter.report_once().await;
                }
            })
            .await;
        }));

        let trimmer = self.trimmer.clone();
        let token = self.token.clone();
        let period = self.config.retention_interval;
        handles.push(tokio::spawn(async move {
            run_every(period, token, || {
                let trimmer = trimmer.clone();
                async move {
                    // Logged by the trimmer; retried next tick.
                    let _ = trimmer.run_once().await;
                }
            })
            .await;
        }));

        info!(
            report_interval_secs = self.config.report_interval.as_secs(),
            retention_interval_secs = self.config.retention_interval.as_secs(),
            "Background loops started"
        );
    }

    /// Cancels everything and waits for the pool and loops to exit.
    pub async fn shutdown(&self) {
        self.token.cancel();
        self.pool.stop().await;

        let handles: Vec<_> = std::mem::take(&mut *self.handles.lock());
        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "Background loop panicked");
            }
        }

        // Final snapshot so the last interval is not lost.
        self.reporter.report_once().await;
        info!("Pipeline scheduler stopped");
    }
}

/// Runs `task` once per `period`, first after one full period, until
/// `token` is cancelled.
async fn run_every<F, Fut>(period: Duration, token: CancellationToken, mut task: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => task().await,
        }
    }
}
