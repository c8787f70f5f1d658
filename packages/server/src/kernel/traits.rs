// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no business logic.
// Lifecycle decisions live in domains/generation/actions and only talk to
// the outside world through these seams.
//
// Naming convention: Base* for trait names (e.g., BaseVideoGenerator, BaseNotifier)

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domains::generation::error::{RecordStoreError, VendorError};
use crate::domains::generation::models::{
    GenerationRecord, JobId, NewScheduledPost, RecordId, RecordPatch, RecordState,
    StatusSnapshot, VideoDuration,
};

// =============================================================================
// Video Generator Trait (Infrastructure - remote generation vendor)
// =============================================================================

#[async_trait]
pub trait BaseVideoGenerator: Send + Sync {
    /// Start a generation and return the vendor-assigned job id.
    async fn submit(&self, prompt: &str, duration: VideoDuration) -> Result<JobId, VendorError>;

    /// What the vendor says right now about one job.
    async fn fetch_status(&self, job_id: &JobId) -> Result<StatusSnapshot, VendorError>;
}

// =============================================================================
// Record Store Trait (Infrastructure - system of record)
// =============================================================================

#[async_trait]
pub trait BaseRecordStore: Send + Sync {
    /// Every generation record, regardless of state.
    async fn list_generation_records(&self) -> Result<Vec<GenerationRecord>, RecordStoreError>;

    async fn find_by_job_id(
        &self,
        job_id: &JobId,
    ) -> Result<Option<GenerationRecord>, RecordStoreError>;

    async fn find_by_state(
        &self,
        state: RecordState,
    ) -> Result<Vec<GenerationRecord>, RecordStoreError>;

    /// Apply every field of the patch in a single call.
    async fn patch(&self, record_id: RecordId, patch: &RecordPatch)
        -> Result<(), RecordStoreError>;

    /// Times already taken by scheduled posts.
    async fn scheduled_post_slots(&self) -> Result<Vec<DateTime<Utc>>, RecordStoreError>;

    async fn create_scheduled_post(
        &self,
        post: &NewScheduledPost,
    ) -> Result<RecordId, RecordStoreError>;
}

// =============================================================================
// Notifier Trait (Infrastructure - chat notifications)
// =============================================================================

#[async_trait]
pub trait BaseNotifier: Send + Sync {
    /// Fire-and-forget. `None` means the default audience.
    ///
    /// Implementations log delivery failures and never return them.
    async fn notify(&self, text: &str, audience: Option<&str>);
}

// =============================================================================
// Caption Writer Trait (Infrastructure - LLM copywriting)
// =============================================================================

#[async_trait]
pub trait BaseCaptionWriter: Send + Sync {
    /// Write a social caption (with hashtags) for a generation prompt.
    async fn write_caption(&self, prompt: &str) -> anyhow::Result<String>;
}
