use axum::{extract::Extension, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::server::app::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    pending_jobs: usize,
    timestamp: DateTime<Utc>,
}

/// Health check endpoint
///
/// Always 200 while the process is serving; `pending_jobs` is the number of
/// in-flight jobs this process knows about.
pub async fn health_handler(Extension(state): Extension<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        pending_jobs: state.deps.registry.len(),
        timestamp: Utc::now(),
    })
}
