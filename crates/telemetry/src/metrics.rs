//! Pipeline metrics aggregation.
//!
//! Counters are lock-free atomics so the enqueue path, every worker, and
//! the periodic reporter can update them concurrently.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// A counter metric.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_by(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    pub fn reset(&self) -> u64 {
        self.0.swap(0, Ordering::Relaxed)
    }
}

/// A gauge metric floored at zero.
#[derive(Debug, Default)]
pub struct Gauge(AtomicU64);

impl Gauge {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn set(&self, val: u64) {
        self.0.store(val, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dec(&self) {
        self.dec_by(1);
    }

    /// Subtracts `n`, saturating at zero.
    pub fn dec_by(&self, n: u64) {
        // The closure always returns Some, so the update cannot fail.
        let _ = self
            .0
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
                Some(v.saturating_sub(n))
            });
    }
}

/// Histogram for latency tracking.
#[derive(Debug)]
pub struct Histogram {
    /// Buckets: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 5s, 10s
    buckets: [AtomicU64; 11],
    sum: AtomicU64,
    count: AtomicU64,
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    const BUCKET_BOUNDS: [u64; 11] = [1, 5, 10, 25, 50, 100, 250, 500, 1000, 5000, 10000];

    pub fn new() -> Self {
        Self {
            buckets: Default::default(),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Records a value in milliseconds.
    pub fn observe(&self, ms: u64) {
        self.sum.fetch_add(ms, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        let idx = Self::BUCKET_BOUNDS
            .iter()
            .position(|&bound| ms <= bound)
            .unwrap_or(Self::BUCKET_BOUNDS.len() - 1);
        self.buckets[idx].fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn sum(&self) -> u64 {
        self.sum.load(Ordering::Relaxed)
    }

    pub fn mean(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            0.0
        } else {
            self.sum() as f64 / count as f64
        }
    }

    /// Returns `(upper_bound_ms, count)` pairs.
    pub fn buckets(&self) -> Vec<(u64, u64)> {
        Self::BUCKET_BOUNDS
            .iter()
            .zip(self.buckets.iter())
            .map(|(&bound, count)| (bound, count.load(Ordering::Relaxed)))
            .collect()
    }
}

/// Counter set shared by the enqueue gate, workers, and background loops.
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    // Core counters
    pub processed_total: Counter,
    pub processed_today: Counter,
    pub errors_total: Counter,
    pub queue_size: Gauge,

    // Breakdown
    pub enqueued_total: Counter,
    pub malformed_total: Counter,
    pub dead_lettered_total: Counter,
    pub batches_total: Counter,
    pub trimmed_total: Counter,

    pub batch_latency_ms: Histogram,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `n` processed records against both cumulative and daily totals.
    pub fn inc_processed(&self, n: u64) {
        self.processed_total.inc_by(n);
        self.processed_today.inc_by(n);
    }

    pub fn inc_errors(&self, n: u64) {
        self.errors_total.inc_by(n);
    }

    pub fn inc_queue_size(&self) {
        self.queue_size.inc();
        self.enqueued_total.inc();
    }

    /// Lowers the queue depth by `n`, never below zero.
    pub fn dec_queue_size(&self, n: u64) {
        self.queue_size.dec_by(n);
    }

    /// Zeroes `processed_today`, returning the value it held.
    pub fn reset_daily(&self) -> u64 {
        self.processed_today.reset()
    }

    /// Takes a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: Utc::now(),
            processed_total: self.processed_total.get(),
            processed_today: self.processed_today.get(),
            errors_total: self.errors_total.get(),
            queue_size: self.queue_size.get(),
            enqueued_total: self.enqueued_total.get(),
            malformed_total: self.malformed_total.get(),
            dead_lettered_total: self.dead_lettered_total.get(),
            batches_total: self.batches_total.get(),
            trimmed_total: self.trimmed_total.get(),
            batch_latency_mean_ms: self.batch_latency_ms.mean(),
        }
    }
}

/// A snapshot of pipeline metrics at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub processed_total: u64,
    pub processed_today: u64,
    pub errors_total: u64,
    pub queue_size: u64,
    pub enqueued_total: u64,
    pub malformed_total: u64,
    pub dead_lettered_total: u64,
    pub batches_total: u64,
    pub trimmed_total: u64,
    pub batch_latency_mean_ms: f64,
}
