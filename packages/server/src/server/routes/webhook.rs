//! Vendor completion webhook.
//!
//! GeminiGen posts `{ "event_name": ..., "data": { "uuid": ..., ... } }`.
//! Some deliveries put `media_url` or the error fields at the top level
//! instead of inside `data`, and older ones use `event` for the name.

use axum::{body::Bytes, extract::Extension, http::StatusCode};
use serde::Deserialize;
use serde_json::Value;

use crate::domains::generation::actions::reconcile;
use crate::domains::generation::models::CompletionSignal;
use crate::server::app::AppState;

pub const EVENT_COMPLETED: &str = "VIDEO_GENERATION_COMPLETED";
pub const EVENT_FAILED: &str = "VIDEO_GENERATION_FAILED";

#[derive(Debug, Default, Deserialize)]
pub struct WebhookPayload {
    pub event_name: Option<String>,
    pub event: Option<String>,
    pub data: Option<WebhookData>,
    pub media_url: Option<String>,
    pub error_message: Option<String>,
    pub error_code: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WebhookData {
    pub uuid: Option<String>,
    pub media_url: Option<String>,
    pub error_message: Option<String>,
    pub error_code: Option<Value>,
}

/// How a delivery should be handled.
#[derive(Debug, PartialEq)]
pub enum WebhookAction {
    Reconcile(CompletionSignal),
    Ignore(String),
}

impl WebhookPayload {
    pub fn event_kind(&self) -> Option<&str> {
        self.event_name
            .as_deref()
            .or(self.event.as_deref())
            .filter(|e| !e.is_empty())
    }

    fn data(&self) -> Option<&WebhookData> {
        self.data.as_ref()
    }

    fn job_id(&self) -> Option<&str> {
        self.data()
            .and_then(|d| d.uuid.as_deref())
            .filter(|id| !id.is_empty())
    }

    fn media_url(&self) -> Option<&str> {
        self.data()
            .and_then(|d| d.media_url.as_deref())
            .filter(|url| !url.is_empty())
            .or(self.media_url.as_deref())
            .filter(|url| !url.is_empty())
    }

    fn error_message(&self) -> String {
        self.data()
            .and_then(|d| d.error_message.clone())
            .filter(|msg| !msg.is_empty())
            .or_else(|| self.error_message.clone())
            .filter(|msg| !msg.is_empty())
            .unwrap_or_else(|| "Unknown error".to_string())
    }

    fn error_code(&self) -> Option<String> {
        self.data()
            .and_then(|d| d.error_code.as_ref())
            .or(self.error_code.as_ref())
            .and_then(code_text)
    }

    /// Normalize the delivery into a completion signal, or say why not.
    pub fn action(&self) -> WebhookAction {
        let event = self.event_kind().unwrap_or("<none>");

        if event != EVENT_COMPLETED && event != EVENT_FAILED {
            return WebhookAction::Ignore(format!("event {}", event));
        }

        let Some(job_id) = self.job_id() else {
            return WebhookAction::Ignore(format!("{} without uuid", event));
        };

        if event == EVENT_FAILED {
            return WebhookAction::Reconcile(CompletionSignal::failed(
                job_id,
                self.error_message(),
                self.error_code(),
            ));
        }

        match self.media_url() {
            Some(url) => WebhookAction::Reconcile(CompletionSignal::completed(job_id, url)),
            // The sweep fetches the URL from the history endpoint later.
            None => WebhookAction::Ignore(format!("{} for {} without media_url", event, job_id)),
        }
    }
}

fn code_text(code: &Value) -> Option<String> {
    match code {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Handle a GeminiGen webhook delivery
///
/// - 400 when the body is not JSON
/// - 500 when reconciliation hit a vendor or record-store error
/// - 200 otherwise, including ignored events and unknown jobs
pub async fn webhook_handler(
    Extension(state): Extension<AppState>,
    body: Bytes,
) -> (StatusCode, &'static str) {
    let payload: WebhookPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!(error = %e, "Rejected malformed webhook body");
            return (StatusCode::BAD_REQUEST, "Invalid JSON");
        }
    };

    tracing::info!(
        event = payload.event_kind().unwrap_or("<none>"),
        job_id = payload.job_id().unwrap_or("<none>"),
        "Webhook received"
    );

    let signal = match payload.action() {
        WebhookAction::Reconcile(signal) => signal,
        WebhookAction::Ignore(reason) => {
            tracing::info!(reason = %reason, "Ignoring webhook");
            return (StatusCode::OK, "OK");
        }
    };

    // Detached so a timed-out or disconnected request cannot stop a
    // reconciliation between the terminal patch and its notification.
    let deps = state.deps.clone();
    let task = tokio::spawn(async move { reconcile(signal, &deps).await });

    match task.await {
        Ok(Ok(outcome)) => {
            tracing::debug!(outcome = ?outcome, "Webhook reconciled");
            (StatusCode::OK, "OK")
        }
        Ok(Err(e)) => {
            tracing::error!(error = %e, "Webhook reconciliation failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Error")
        }
        Err(e) => {
            tracing::error!(error = %e, "Webhook reconciliation task panicked");
            (StatusCode::INTERNAL_SERVER_ERROR, "Error")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::generation::models::SignalOutcome;

    fn parse(value: Value) -> WebhookPayload {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn completed_with_nested_media_url() {
        let payload = parse(serde_json::json!({
            "event_name": "VIDEO_GENERATION_COMPLETED",
            "data": {"uuid": "abc123", "media_url": "https://cdn.example/cat.mp4"}
        }));

        assert_eq!(
            payload.action(),
            WebhookAction::Reconcile(CompletionSignal::completed(
                "abc123",
                "https://cdn.example/cat.mp4"
            ))
        );
    }

    #[test]
    fn completed_with_top_level_media_url_and_legacy_event_key() {
        let payload = parse(serde_json::json!({
            "event": "VIDEO_GENERATION_COMPLETED",
            "media_url": "https://cdn.example/top.mp4",
            "data": {"uuid": "abc123"}
        }));

        match payload.action() {
            WebhookAction::Reconcile(signal) => assert_eq!(
                signal.outcome,
                SignalOutcome::Completed {
                    asset_url: "https://cdn.example/top.mp4".into()
                }
            ),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn failed_reads_error_fields_from_either_level() {
        let payload = parse(serde_json::json!({
            "event_name": "VIDEO_GENERATION_FAILED",
            "error_code": 42,
            "data": {"uuid": "abc123", "error_message": "content_policy"}
        }));

        assert_eq!(
            payload.action(),
            WebhookAction::Reconcile(CompletionSignal::failed(
                "abc123",
                "content_policy",
                Some("42".into())
            ))
        );
    }

    #[test]
    fn other_events_and_missing_urls_are_ignored() {
        let progress = parse(serde_json::json!({
            "event_name": "VIDEO_GENERATION_PROGRESS",
            "data": {"uuid": "abc123"}
        }));
        assert!(matches!(progress.action(), WebhookAction::Ignore(_)));

        let no_url = parse(serde_json::json!({
            "event_name": "VIDEO_GENERATION_COMPLETED",
            "data": {"uuid": "abc123"}
        }));
        assert!(matches!(no_url.action(), WebhookAction::Ignore(_)));
    }
}
