//! HTTP surface: webhook route and health check.

mod common;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use common::*;
use reels_core::domains::generation::actions::submit_ready_records;
use reels_core::domains::generation::models::RecordState;
use std::time::Duration;

use reels_core::kernel::test_dependencies::{
    MockCaptionWriter, MockRecordStore, MockVideoGenerator,
};
use reels_core::kernel::TestDependencies;
use tower::ServiceExt;

#[tokio::test]
async fn malformed_body_is_rejected() {
    let h = TestHarness::new();

    assert_eq!(h.post_webhook("{not json").await, StatusCode::BAD_REQUEST);
    assert!(h.mocks.records.patches().is_empty());
}

#[tokio::test]
async fn other_events_are_acknowledged() {
    let h = TestHarness::new();

    let body = serde_json::json!({
        "event_name": "VIDEO_GENERATION_PROGRESS",
        "data": { "uuid": "abc123" }
    });
    assert_eq!(h.post_webhook(body.to_string()).await, StatusCode::OK);
    assert!(h.mocks.records.patches().is_empty());
    assert!(h.mocks.notifier.sent().is_empty());
}

#[tokio::test]
async fn unknown_job_is_acknowledged_without_side_effects() {
    let h = TestHarness::new();

    let status = h.post_webhook(completed_event("ghost", CAT_URL)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(h.mocks.records.patches().is_empty());
    assert!(h.mocks.notifier.sent().is_empty());
}

#[tokio::test]
async fn store_failure_returns_server_error_and_keeps_job() {
    let h = TestHarness::with_mocks(
        TestDependencies::new()
            .mock_vendor(MockVideoGenerator::new().with_job_id("abc123"))
            .mock_records(MockRecordStore::new().with_record(ready_record(1))),
    );
    submit_ready_records(Some("chat-1"), &h.deps).await.unwrap();

    h.mocks.records.fail_next_patches(1);
    let status = h.post_webhook(completed_event("abc123", CAT_URL)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        h.mocks.records.record(1).unwrap().state,
        RecordState::Processing
    );
    assert_eq!(h.deps.registry.len(), 1);

    // Vendor redelivery succeeds
    let status = h.post_webhook(completed_event("abc123", CAT_URL)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        h.mocks.records.record(1).unwrap().state,
        RecordState::Completed
    );
}

#[tokio::test(start_paused = true)]
async fn timed_out_request_still_finishes_completion() {
    let h = TestHarness::with_mocks(
        TestDependencies::new()
            .mock_vendor(MockVideoGenerator::new().with_job_id("abc123"))
            .mock_records(MockRecordStore::new().with_record(ready_record(1)))
            .mock_captions(MockCaptionWriter::slow(
                "Wait for it",
                Duration::from_secs(120),
            )),
    );
    submit_ready_records(Some("chat-1"), &h.deps).await.unwrap();

    // The caption outlasts the request timeout
    let status = h.post_webhook(completed_event("abc123", CAT_URL)).await;
    assert_eq!(status, StatusCode::REQUEST_TIMEOUT);

    tokio::time::sleep(Duration::from_secs(60)).await;

    assert_eq!(
        h.mocks.records.record(1).unwrap().state,
        RecordState::Completed
    );
    assert_eq!(h.mocks.records.posts().len(), 1);
    assert_eq!(
        h.mocks
            .notifier
            .sent_containing("Video Generation Complete!")
            .len(),
        1
    );

    // Redelivery is absorbed
    let status = h.post_webhook(completed_event("abc123", CAT_URL)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(h.mocks.records.terminal_patches(1).len(), 1);
    assert_eq!(h.mocks.records.posts().len(), 1);
}

#[tokio::test]
async fn health_reports_pending_jobs() {
    let h = TestHarness::with_mocks(
        TestDependencies::new()
            .mock_vendor(MockVideoGenerator::new().with_job_id("abc123"))
            .mock_records(MockRecordStore::new().with_record(ready_record(1))),
    );
    submit_ready_records(None, &h.deps).await.unwrap();

    let response = h
        .router()
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["pending_jobs"], 1);
    assert!(json["timestamp"].is_string());
}

#[tokio::test]
async fn webhook_is_mounted_at_configured_path_only() {
    let h = TestHarness::new();

    let response = h
        .router()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/somewhere-else")
                .body(Body::from(completed_event("abc123", CAT_URL)))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
