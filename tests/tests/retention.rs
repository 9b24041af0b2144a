//! Tests for log retention and the background loops.

use std::sync::Arc;
use std::time::Duration;
use stream::{EntryId, StreamLog};
use tokio_util::sync::CancellationToken;
use worker::{MetricsReporter, PipelineScheduler, RetentionTrimmer, ScheduleConfig};

use integration_tests::{fixtures, setup::TestPipeline};

/// Trimming 25 entries down to 10 removes exactly 15.
#[tokio::test]
async fn test_trim_removes_oldest_entries() {
    let pipeline = TestPipeline::new().await;
    pipeline.enqueue_all(fixtures::records(25, "t1")).await;
    pipeline.metrics.inc_processed(25);

    let trimmer = RetentionTrimmer::new(pipeline.log.clone(), pipeline.metrics.clone(), 10);
    let removed = trimmer.run_once().await.unwrap();

    assert_eq!(removed, 15);
    assert_eq!(pipeline.log_len().await, 10);
    assert_eq!(pipeline.metrics.trimmed_total.get(), 15);
    assert_eq!(pipeline.metrics.processed_today.get(), 0);
    assert_eq!(pipeline.metrics.processed_total.get(), 25);

    let bounds = pipeline.log.bounds().await.unwrap();
    assert_eq!(bounds.earliest, EntryId(15));
}

/// The log never holds more than the cap after a trim, whatever its size.
#[tokio::test]
async fn test_trim_bound_holds_for_any_length() {
    for (len, cap) in [(0usize, 10u64), (5, 10), (10, 10), (11, 10), (40, 1), (40, 0)] {
        let pipeline = TestPipeline::new().await;
        if len > 0 {
            pipeline.enqueue_all(fixtures::records(len, "t1")).await;
        }

        let trimmer = RetentionTrimmer::new(pipeline.log.clone(), pipeline.metrics.clone(), cap);
        let removed = trimmer.run_once().await.unwrap();

        assert!(pipeline.log_len().await <= cap, "len {} cap {}", len, cap);
        assert_eq!(removed, (len as u64).saturating_sub(cap));
    }
}

/// Unread entries lost to trimming are skipped; the cursor moves past them.
#[tokio::test]
async fn test_consumer_skips_trimmed_entries() {
    let pipeline = TestPipeline::new().await;
    pipeline.enqueue_all(fixtures::records(25, "t1")).await;

    RetentionTrimmer::new(pipeline.log.clone(), pipeline.metrics.clone(), 10)
        .run_once()
        .await
        .unwrap();

    let mut processed = 0;
    loop {
        let n = pipeline.run_cycle(100).await;
        if n == 0 {
            break;
        }
        processed += n;
    }

    assert_eq!(processed, 10);
    assert_eq!(pipeline.reader.group().committed(), EntryId(25));
}

/// The scheduler drives processing, trimming, and reporting until shutdown.
#[tokio::test]
async fn test_scheduler_runs_pipeline_until_shutdown() {
    let pipeline = TestPipeline::new().await;
    pipeline.enqueue_all(fixtures::records(40, "t1")).await;

    let token = CancellationToken::new();
    let pool = Arc::new(worker::WorkerPool::new(
        pipeline.reader.clone(),
        pipeline.processor.clone(),
        worker::PipelineConfig {
            workers: 2,
            batch_size: 10,
            block_timeout_ms: 10,
            idle_backoff_ms: 5,
            ..worker::PipelineConfig::default()
        },
        token.child_token(),
    ));

    let scheduler = PipelineScheduler::new(
        pool.clone(),
        MetricsReporter::new(pipeline.metrics.clone()),
        RetentionTrimmer::new(pipeline.log.clone(), pipeline.metrics.clone(), 5),
        ScheduleConfig {
            report_interval: Duration::from_millis(20),
            retention_interval: Duration::from_millis(200),
        },
        token,
    );

    scheduler.start();
    assert!(pipeline.wait_for_results(40, Duration::from_secs(5)).await);
    tokio::time::sleep(Duration::from_millis(300)).await;

    tokio::time::timeout(Duration::from_secs(5), scheduler.shutdown())
        .await
        .expect("Shutdown should finish");

    assert!(!pool.is_running());
    assert!(pipeline.log_len().await <= 5);
    assert_eq!(pipeline.metrics.processed_total.get(), 40);
}
