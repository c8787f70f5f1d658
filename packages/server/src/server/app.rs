//! Application setup and server configuration.

use std::time::Duration;

use axum::{
    extract::Extension,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::kernel::ServerDeps;
use crate::server::routes::{health_handler, webhook_handler};

// Caption generation alone may take 30s
const REQUEST_TIMEOUT: Duration = Duration::from_secs(90);

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub deps: ServerDeps,
}

/// Build the Axum application router
///
/// Mounts the vendor webhook at `webhook_path` and the health check at
/// `/health`.
pub fn build_app(deps: ServerDeps, webhook_path: &str) -> Router {
    let state = AppState { deps };

    Router::new()
        .route("/health", get(health_handler))
        .route(webhook_path, post(webhook_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
                .layer(Extension(state)),
        )
}
