//! Test harness over the in-memory mocks.
//!
//! `restart()` simulates a crash: the mocks (vendor, record store, chat)
//! survive, the registry does not.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use reels_core::kernel::{ServerDeps, TestDependencies};
use reels_core::server::build_app;
use tower::ServiceExt;

pub const WEBHOOK_PATH: &str = "/sora-callback";

pub struct TestHarness {
    pub mocks: TestDependencies,
    pub deps: ServerDeps,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_mocks(TestDependencies::new())
    }

    pub fn with_mocks(mocks: TestDependencies) -> Self {
        // Run tests with: RUST_LOG=debug cargo test -- --nocapture
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let deps = mocks.server_deps();
        Self { mocks, deps }
    }

    /// Lose the registry, keep everything external.
    pub fn restart(&mut self) {
        self.deps = self.mocks.server_deps();
    }

    pub fn router(&self) -> Router {
        build_app(self.deps.clone(), WEBHOOK_PATH)
    }

    /// POST a raw body to the webhook route.
    pub async fn post_webhook(&self, body: impl Into<String>) -> StatusCode {
        let request = Request::builder()
            .method("POST")
            .uri(WEBHOOK_PATH)
            .header("content-type", "application/json")
            .body(Body::from(body.into()))
            .unwrap();

        self.router().oneshot(request).await.unwrap().status()
    }
}

pub fn completed_event(job_id: &str, url: &str) -> String {
    serde_json::json!({
        "event_name": "VIDEO_GENERATION_COMPLETED",
        "data": { "uuid": job_id, "media_url": url }
    })
    .to_string()
}

pub fn failed_event(job_id: &str, message: &str, code: &str) -> String {
    serde_json::json!({
        "event_name": "VIDEO_GENERATION_FAILED",
        "data": { "uuid": job_id, "error_message": message, "error_code": code }
    })
    .to_string()
}
