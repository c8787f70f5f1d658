//! Server dependencies for the coordinator (using traits for testability)
//!
//! This module provides the central dependency container used by all
//! generation actions. All external services use trait abstractions to
//! enable testing.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use baserow::BaserowError;
use geminigen::{GeminiGenClient, GeminiGenError, GenerationStatus, SoraRequest};
use telegram::TelegramBot;

use crate::domains::generation::error::{RecordStoreError, VendorError};
use crate::domains::generation::models::{JobId, StatusSnapshot, VideoDuration};
use crate::domains::generation::registry::JobRegistry;
use crate::kernel::{BaseCaptionWriter, BaseNotifier, BaseRecordStore, BaseVideoGenerator};

// =============================================================================
// GeminiGen Adapter (implements BaseVideoGenerator trait)
// =============================================================================

/// Wrapper around GeminiGenClient that implements BaseVideoGenerator trait
pub struct GeminiGenAdapter(pub Arc<GeminiGenClient>);

impl GeminiGenAdapter {
    pub fn new(client: Arc<GeminiGenClient>) -> Self {
        Self(client)
    }
}

#[async_trait]
impl BaseVideoGenerator for GeminiGenAdapter {
    async fn submit(&self, prompt: &str, duration: VideoDuration) -> Result<JobId, VendorError> {
        let request = SoraRequest::portrait(prompt, duration.seconds());
        let uuid = self.0.generate(&request).await?;
        Ok(JobId::new(uuid))
    }

    async fn fetch_status(&self, job_id: &JobId) -> Result<StatusSnapshot, VendorError> {
        let entry = self.0.history(job_id.as_str()).await?;

        let snapshot = match entry.generation_status() {
            GenerationStatus::Processing => StatusSnapshot::Running {
                progress: entry.status_percentage,
            },
            GenerationStatus::Completed => {
                let asset_url = entry.video_url().ok_or(GeminiGenError::MissingMediaUrl)?;
                StatusSnapshot::Completed {
                    asset_url: asset_url.to_string(),
                }
            }
            GenerationStatus::Failed => StatusSnapshot::Failed {
                error_message: entry
                    .error_message
                    .clone()
                    .or_else(|| entry.status_desc.clone())
                    .filter(|msg| !msg.is_empty())
                    .unwrap_or_else(|| "Unknown error".to_string()),
            },
        };

        Ok(snapshot)
    }
}

impl From<GeminiGenError> for VendorError {
    fn from(err: GeminiGenError) -> Self {
        match err {
            GeminiGenError::Api { status, message } => VendorError::Api { status, message },
            GeminiGenError::MissingUuid => VendorError::MissingJobId,
            GeminiGenError::MissingMediaUrl => {
                VendorError::Malformed("completed without a video url".to_string())
            }
            GeminiGenError::Http(e) => VendorError::Transport(e.to_string()),
        }
    }
}

impl From<BaserowError> for RecordStoreError {
    fn from(err: BaserowError) -> Self {
        match err {
            BaserowError::Api { status, message } | BaserowError::Login { status, message } => {
                RecordStoreError::Api { status, message }
            }
            BaserowError::Unauthorized | BaserowError::MissingToken => {
                RecordStoreError::Unauthorized
            }
            BaserowError::Http(e) => RecordStoreError::Transport(e.to_string()),
        }
    }
}

// =============================================================================
// Telegram Notifier (implements BaseNotifier trait)
// =============================================================================

/// Sends notifications to one chat, or to every default chat.
pub struct TelegramNotifier {
    bot: Arc<TelegramBot>,
    default_chats: Vec<String>,
}

impl TelegramNotifier {
    pub fn new(bot: Arc<TelegramBot>, default_chats: Vec<String>) -> Self {
        Self { bot, default_chats }
    }
}

#[async_trait]
impl BaseNotifier for TelegramNotifier {
    async fn notify(&self, text: &str, audience: Option<&str>) {
        let chats: Vec<&str> = match audience {
            Some(chat_id) => vec![chat_id],
            None => self.default_chats.iter().map(String::as_str).collect(),
        };

        for chat_id in chats {
            if let Err(e) = self.bot.send_message(chat_id, text).await {
                tracing::warn!(chat_id, error = %e, "Failed to send Telegram notification");
            }
        }
    }
}

// =============================================================================
// ServerDeps
// =============================================================================

/// Server dependencies accessible to actions (using traits for testability)
#[derive(Clone)]
pub struct ServerDeps {
    pub vendor: Arc<dyn BaseVideoGenerator>,
    pub records: Arc<dyn BaseRecordStore>,
    pub notifier: Arc<dyn BaseNotifier>,
    pub captions: Arc<dyn BaseCaptionWriter>,
    /// In-flight jobs submitted or recovered by this process
    pub registry: Arc<JobRegistry>,
    /// Still-running jobs older than this are timed out by the sweep
    pub stale_after: Duration,
}

impl ServerDeps {
    pub fn new(
        vendor: Arc<dyn BaseVideoGenerator>,
        records: Arc<dyn BaseRecordStore>,
        notifier: Arc<dyn BaseNotifier>,
        captions: Arc<dyn BaseCaptionWriter>,
        stale_after: Duration,
    ) -> Self {
        Self {
            vendor,
            records,
            notifier,
            captions,
            registry: Arc::new(JobRegistry::new()),
            stale_after,
        }
    }
}
