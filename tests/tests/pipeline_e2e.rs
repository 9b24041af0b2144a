//! End-to-end tests for the enrichment pipeline.
//!
//! These tests run the real gate, consumer group, fan-out, and sink over
//! an in-memory log:
//! enqueue → log → batch read → group by tenant → enrich → store → ack

use inventory_core::{FailureStage, InventoryRecord};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use stream::{EntryId, FileOffsetStore, LogEntry, MemoryLog, StreamLog};
use worker::{group_by_tenant, EnrichmentConfig};

use integration_tests::{
    fixtures,
    mocks::{FailingStore, FlakyOracle, StubOracle},
    setup::{PipelineOptions, TestPipeline},
};

/// 250 records over two tenants, read in batches of 100.
#[tokio::test]
async fn test_batches_cover_every_record_once_grouped_by_tenant() {
    let pipeline = TestPipeline::new().await;
    let accepted = pipeline.enqueue_all(fixtures::two_tenant_records()).await;
    assert_eq!(accepted.len(), 250);
    assert_eq!(pipeline.metrics.queue_size.get(), 250);

    let mut seen = Vec::new();
    let mut bucket_sizes: HashMap<String, usize> = HashMap::new();

    for _ in 0..3 {
        let batch = pipeline
            .reader
            .read_batch(100, Duration::from_millis(10))
            .await
            .expect("Expected a batch");
        let claim = batch.claim;

        for partition in group_by_tenant(batch.into_records()) {
            assert!(partition
                .records
                .iter()
                .all(|r| r.tenant_id == partition.tenant_id));
            *bucket_sizes.entry(partition.tenant_id.clone()).or_default() +=
                partition.records.len();
            seen.extend(partition.records.into_iter().map(|r| r.id));
        }

        pipeline.reader.group().ack(&claim).await.unwrap();
    }

    assert_eq!(bucket_sizes.len(), 2);
    assert_eq!(bucket_sizes["t1"], 150);
    assert_eq!(bucket_sizes["t2"], 100);

    let unique: HashSet<_> = seen.iter().cloned().collect();
    assert_eq!(seen.len(), 250, "Every record should be read exactly once");
    assert_eq!(unique, accepted.into_iter().collect::<HashSet<_>>());

    assert!(pipeline
        .reader
        .read_batch(100, Duration::from_millis(10))
        .await
        .is_none());
    assert_eq!(pipeline.metrics.queue_size.get(), 0);
    assert_eq!(pipeline.reader.group().committed(), EntryId(250));
}

/// Full processing of the same 250 records stores one result per record.
#[tokio::test]
async fn test_processing_stores_one_result_per_record() {
    let pipeline = TestPipeline::new().await;
    pipeline.enqueue_all(fixtures::two_tenant_records()).await;

    let mut processed = 0;
    for _ in 0..3 {
        processed += pipeline.run_cycle(100).await;
    }

    assert_eq!(processed, 250);
    assert_eq!(pipeline.results.len(), 250);
    assert_eq!(pipeline.metrics.processed_total.get(), 250);
    assert_eq!(pipeline.metrics.processed_today.get(), 250);
    assert_eq!(pipeline.metrics.batches_total.get(), 3);
    assert_eq!(pipeline.metrics.errors_total.get(), 0);
    assert!(pipeline.results.results().iter().all(|r| !r.is_error()));
}

/// A failing lookup is contained to its own record.
#[tokio::test]
async fn test_failed_lookup_does_not_affect_neighbours() {
    let oracle = Arc::new(StubOracle::new());
    let pipeline = TestPipeline::build(PipelineOptions {
        oracle: oracle.clone(),
        ..PipelineOptions::default()
    })
    .await;

    let ids = pipeline
        .enqueue_all(vec![
            InventoryRecord::new("t1", "a1", "nginx", "1.18.0"),
            InventoryRecord::new("t1", "a1", "curl", "8.0"),
        ])
        .await;

    assert_eq!(pipeline.run_cycle(100).await, 2);

    let results = pipeline.results.results();
    assert_eq!(results.len(), 2);

    let nginx = results.iter().find(|r| r.record_id == ids[0]).unwrap();
    assert!(nginx.is_error());
    assert!(nginx.findings.is_empty());

    let curl = results.iter().find(|r| r.record_id == ids[1]).unwrap();
    assert!(!curl.is_error());
    assert!(!curl.findings.is_empty());

    // nginx is tried max_attempts times, curl once
    assert_eq!(oracle.calls(), 4);
    assert_eq!(pipeline.metrics.errors_total.get(), 1);

    let letters = pipeline.dead_letters.letters();
    assert_eq!(letters.len(), 1);
    assert_eq!(letters[0].record.id, ids[0]);
    assert_eq!(letters[0].stage, FailureStage::Enrichment);
    assert_eq!(letters[0].attempts, 3);
    assert_eq!(pipeline.metrics.dead_lettered_total.get(), 1);
}

/// Transient lookup failures within the retry budget are not errors.
#[tokio::test]
async fn test_transient_lookup_failures_are_retried() {
    let pipeline = TestPipeline::build(PipelineOptions {
        oracle: Arc::new(FlakyOracle::new(2)),
        ..PipelineOptions::default()
    })
    .await;

    pipeline.enqueue_all(fixtures::records(5, "t1")).await;
    assert_eq!(pipeline.run_cycle(100).await, 5);

    assert!(pipeline.results.results().iter().all(|r| !r.is_error()));
    assert!(pipeline.dead_letters.is_empty());
    assert_eq!(pipeline.metrics.errors_total.get(), 0);
}

/// A batch the store keeps rejecting is dead-lettered and still acked.
#[tokio::test]
async fn test_persist_failure_dead_letters_batch() {
    let store = FailingStore::new();
    let pipeline = TestPipeline::build(PipelineOptions {
        store: Some(Arc::new(store.clone())),
        ..PipelineOptions::default()
    })
    .await;

    pipeline.enqueue_all(fixtures::records(4, "t1")).await;
    pipeline.run_cycle(100).await;

    assert_eq!(store.attempts(), 3);
    assert_eq!(pipeline.metrics.errors_total.get(), 1);

    let letters = pipeline.dead_letters.letters();
    assert_eq!(letters.len(), 4);
    assert!(letters.iter().all(|l| l.stage == FailureStage::Persist));
    assert_eq!(pipeline.metrics.dead_lettered_total.get(), 4);

    assert_eq!(pipeline.reader.group().committed(), EntryId(4));
    assert!(pipeline
        .reader
        .read_batch(100, Duration::from_millis(10))
        .await
        .is_none());
}

/// Undecodable entries are skipped and counted without blocking the batch.
#[tokio::test]
async fn test_malformed_entries_are_skipped() {
    let pipeline = TestPipeline::new().await;

    pipeline
        .log
        .append(LogEntry {
            data: "{not json".to_string(),
            tenant_id: "t1".to_string(),
            agent_id: "a1".to_string(),
            ordering_key: 0,
        })
        .await
        .unwrap();
    pipeline
        .enqueue_all(vec![InventoryRecord::new("t1", "a1", "curl", "8.0")])
        .await;

    assert_eq!(pipeline.run_cycle(100).await, 1);
    assert_eq!(pipeline.metrics.malformed_total.get(), 1);
    assert_eq!(pipeline.results.len(), 1);
    assert_eq!(pipeline.reader.group().committed(), EntryId(2));
}

/// Concurrent workers never process the same entry twice.
#[tokio::test]
async fn test_worker_pool_processes_each_record_once() {
    let pipeline = TestPipeline::new().await;

    let mut records = Vec::new();
    for tenant in ["t1", "t2", "t3", "t4", "t5"] {
        records.extend(fixtures::records(100, tenant));
    }
    let accepted = pipeline.enqueue_all(records).await;

    let pool = pipeline.worker_pool(4, 25);
    pool.start();
    assert!(
        pipeline.wait_for_results(500, Duration::from_secs(10)).await,
        "Workers should store all 500 results"
    );
    pool.stop().await;
    assert!(!pool.is_running());

    let stored: Vec<String> = pipeline
        .results
        .results()
        .into_iter()
        .map(|r| r.record_id)
        .collect();
    let unique: HashSet<_> = stored.iter().cloned().collect();
    assert_eq!(stored.len(), 500, "No record should be processed twice");
    assert_eq!(unique, accepted.into_iter().collect::<HashSet<_>>());
    assert_eq!(pipeline.reader.group().committed(), EntryId(500));
    assert_eq!(pipeline.metrics.queue_size.get(), 0);
}

/// Lookups across tenants never exceed the configured concurrency.
#[tokio::test]
async fn test_enrichment_concurrency_is_bounded() {
    let oracle = Arc::new(StubOracle::with_delay(Duration::from_millis(20)));
    let pipeline = TestPipeline::build(PipelineOptions {
        oracle: oracle.clone(),
        enrichment: EnrichmentConfig {
            concurrency: 2,
            retry_backoff_ms: 1,
            ..EnrichmentConfig::default()
        },
        ..PipelineOptions::default()
    })
    .await;

    let mut records = Vec::new();
    for tenant in ["t1", "t2", "t3", "t4", "t5", "t6"] {
        records.extend(fixtures::records(3, tenant));
    }

    let results = pipeline
        .fanout
        .enrich_partitions(group_by_tenant(records))
        .await;

    assert_eq!(results.len(), 18);
    assert_eq!(oracle.calls(), 18);
    assert!(oracle.peak_in_flight() <= 2, "peak was {}", oracle.peak_in_flight());
    assert_eq!(pipeline.fanout.available_permits(), 2);
}

/// A restarted consumer resumes from its committed offset.
#[tokio::test]
async fn test_restart_resumes_from_committed_offset() {
    let dir = tempfile::tempdir().unwrap();
    let offsets_path = dir.path().join("offsets.json");
    let log = Arc::new(MemoryLog::new());

    let first = TestPipeline::build(PipelineOptions {
        log: log.clone(),
        offsets: Arc::new(FileOffsetStore::new(offsets_path.clone())),
        ..PipelineOptions::default()
    })
    .await;
    first.enqueue_all(fixtures::records(30, "t1")).await;
    assert_eq!(first.run_cycle(10).await, 10);
    assert_eq!(first.run_cycle(10).await, 10);
    drop(first);

    let second = TestPipeline::build(PipelineOptions {
        log: log.clone(),
        offsets: Arc::new(FileOffsetStore::new(offsets_path.clone())),
        ..PipelineOptions::default()
    })
    .await;
    assert_eq!(second.reader.group().committed(), EntryId(20));

    let mut processed = 0;
    loop {
        let n = second.run_cycle(10).await;
        if n == 0 {
            break;
        }
        processed += n;
    }

    assert_eq!(processed, 10);
    assert_eq!(second.results.len(), 10);
}
