//! Tests for the HTTP ingest and health endpoints.
//!
//! The router runs in-process against an in-memory log.

use axum::http::StatusCode;
use axum_test::TestServer;
use inventory_core::ResultStore;
use std::sync::Arc;
use stream::{EnqueueGate, StreamLog};
use telemetry::{HealthRegistry, PipelineMetrics};
use worker::MemoryResultStore;

use integration_tests::{fixtures, mocks::UnavailableLog, setup::TestPipeline};

fn server(pipeline: &TestPipeline) -> TestServer {
    TestServer::new(pipeline.router()).expect("Failed to create test server")
}

/// Array payload: every record is enqueued and its ID returned.
#[tokio::test]
async fn test_ingest_array_format() {
    let pipeline = TestPipeline::new().await;
    let server = server(&pipeline);

    let payload = fixtures::array_payload(fixtures::record_jsons(3, "t1"));
    let response = server
        .post("/v1/inventory")
        .content_type("application/json")
        .bytes(payload.into())
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["accepted"], 3);
    assert_eq!(body["ids"].as_array().unwrap().len(), 3);
    assert!(body.get("errors").is_none());

    assert_eq!(pipeline.log_len().await, 3);
    assert_eq!(pipeline.metrics.queue_size.get(), 3);
}

/// Object payload with a `records` field.
#[tokio::test]
async fn test_ingest_object_format() {
    let pipeline = TestPipeline::new().await;
    let server = server(&pipeline);

    let payload = fixtures::object_payload(fixtures::record_jsons(2, "t2"));
    let response = server
        .post("/v1/inventory")
        .content_type("application/json")
        .bytes(payload.into())
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["accepted"], 2);
    assert_eq!(pipeline.log_len().await, 2);
}

/// Single legacy-format record keeps its mapped fields through the log.
#[tokio::test]
async fn test_ingest_single_legacy_record() {
    let pipeline = TestPipeline::new().await;
    let server = server(&pipeline);

    let payload = fixtures::single_payload(fixtures::legacy_record_json("acme", "nginx", "1.18.0"));
    let response = server
        .post("/v1/inventory")
        .content_type("application/json")
        .bytes(payload.into())
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    let id = body["ids"][0].as_str().unwrap().to_string();

    let entries = pipeline.log.entries();
    assert_eq!(entries.len(), 1);
    let record = entries[0].1.decode_record().unwrap();
    assert_eq!(record.id, id);
    assert_eq!(record.tenant_id, "acme");
    assert_eq!(record.name, "nginx");
    assert_eq!(record.version, "1.18.0");
    assert!(!record.has_unset_timestamp());
}

/// Invalid records are reported without rejecting their valid neighbours.
#[tokio::test]
async fn test_ingest_partial_rejection() {
    let pipeline = TestPipeline::new().await;
    let server = server(&pipeline);

    let mut invalid = fixtures::record_json("t1", "nginx", "1.18.0");
    invalid["tenant_id"] = serde_json::Value::String(String::new());
    let payload = fixtures::array_payload(vec![
        fixtures::record_json("t1", "curl", "8.0"),
        invalid,
    ]);

    let response = server
        .post("/v1/inventory")
        .content_type("application/json")
        .bytes(payload.into())
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["accepted"], 1);
    let errors = body["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].as_str().unwrap().starts_with("record 1:"));
    assert_eq!(pipeline.log_len().await, 1);
}

/// All records invalid returns VALID_001 with per-record details.
#[tokio::test]
async fn test_ingest_all_invalid_returns_400() {
    let pipeline = TestPipeline::new().await;
    let server = server(&pipeline);

    let mut record = fixtures::record_json("t1", "nginx", "1.18.0");
    record["agent_id"] = serde_json::Value::String(String::new());

    let response = server
        .post("/v1/inventory")
        .content_type("application/json")
        .bytes(fixtures::single_payload(record).into())
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "VALID_001");
    assert_eq!(body["details"].as_array().unwrap().len(), 1);
    assert_eq!(pipeline.log_len().await, 0);
}

/// Unparseable bodies return VALID_002.
#[tokio::test]
async fn test_invalid_json_returns_400() {
    let pipeline = TestPipeline::new().await;
    let server = server(&pipeline);

    let response = server
        .post("/v1/inventory")
        .content_type("application/json")
        .bytes("not json at all".into())
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "VALID_002");
}

#[tokio::test]
async fn test_empty_batch_returns_400() {
    let pipeline = TestPipeline::new().await;
    let server = server(&pipeline);

    let response = server
        .post("/v1/inventory")
        .content_type("application/json")
        .bytes("[]".into())
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

/// More than 1000 records returns 413.
#[tokio::test]
async fn test_batch_exceeds_limit_returns_413() {
    let pipeline = TestPipeline::new().await;
    let server = server(&pipeline);

    let payload = fixtures::array_payload(fixtures::oversized_batch());
    let response = server
        .post("/v1/inventory")
        .content_type("application/json")
        .bytes(payload.into())
        .await;

    response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "VALID_003");
    assert_eq!(pipeline.log_len().await, 0);
}

/// Bodies over 1MB return 413.
#[tokio::test]
async fn test_oversized_payload_returns_413() {
    let pipeline = TestPipeline::new().await;
    let server = server(&pipeline);

    let response = server
        .post("/v1/inventory")
        .content_type("application/json")
        .bytes(fixtures::oversized_payload().into())
        .await;

    response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
}

/// An unreachable log turns ingest into 503 and fails readiness.
#[tokio::test]
async fn test_unavailable_log_returns_503() {
    let metrics = Arc::new(PipelineMetrics::new());
    let log: Arc<dyn StreamLog> = Arc::new(UnavailableLog);
    let store: Arc<dyn ResultStore> = Arc::new(MemoryResultStore::new());
    let state = api::AppState::new(
        EnqueueGate::new(log, metrics.clone()),
        store,
        metrics.clone(),
        Arc::new(HealthRegistry::new()),
    );
    let server = TestServer::new(api::router(state)).expect("Failed to create test server");

    let payload = fixtures::array_payload(fixtures::record_jsons(2, "t1"));
    let response = server
        .post("/v1/inventory")
        .content_type("application/json")
        .bytes(payload.into())
        .await;

    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "QUEUE_001");
    assert_eq!(metrics.queue_size.get(), 0);

    server
        .get("/health/ready")
        .await
        .assert_status(StatusCode::SERVICE_UNAVAILABLE);
    server.get("/health/live").await.assert_status_ok();
}

/// /health reports both dependencies and the queue size.
#[tokio::test]
async fn test_health_endpoint_structure() {
    let pipeline = TestPipeline::new().await;
    pipeline.enqueue_all(fixtures::records(2, "t1")).await;
    let server = server(&pipeline);

    let response = server.get("/health").await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["log_backend"], "memory");
    assert_eq!(body["log_connected"], true);
    assert_eq!(body["result_store_connected"], true);
    assert_eq!(body["queue_size"], 2);

    server.get("/health/ready").await.assert_status_ok();
    server.get("/health/live").await.assert_status_ok();
}

/// /metrics returns the counter snapshot.
#[tokio::test]
async fn test_metrics_endpoint() {
    let pipeline = TestPipeline::new().await;
    let server = server(&pipeline);

    server
        .post("/v1/inventory")
        .content_type("application/json")
        .bytes(fixtures::array_payload(fixtures::record_jsons(4, "t1")).into())
        .await
        .assert_status_ok();
    pipeline.run_cycle(100).await;

    let response = server.get("/metrics").await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["enqueued_total"], 4);
    assert_eq!(body["processed_total"], 4);
    assert_eq!(body["queue_size"], 0);
}

/// Records posted over HTTP come out the other end as enriched results.
#[tokio::test]
async fn test_ingest_to_result_e2e() {
    let pipeline = TestPipeline::new().await;
    let server = server(&pipeline);

    let payload = fixtures::array_payload(vec![
        fixtures::record_json("t1", "nginx", "1.18.0"),
        fixtures::record_json("t2", "curl", "8.0"),
    ]);
    let response = server
        .post("/v1/inventory")
        .content_type("application/json")
        .bytes(payload.into())
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    let ids: Vec<String> = body["ids"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect();

    assert_eq!(pipeline.run_cycle(100).await, 2);

    let results = pipeline.results.results();
    let nginx = results.iter().find(|r| r.record_id == ids[0]).unwrap();
    assert_eq!(nginx.tenant_id, "t1");
    assert!(nginx.is_error());

    let curl = results.iter().find(|r| r.record_id == ids[1]).unwrap();
    assert_eq!(curl.tenant_id, "t2");
    assert!(!curl.findings.is_empty());
}
