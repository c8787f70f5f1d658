//! Record fixtures for the mock record store.

use chrono::{DateTime, Utc};
use reels_core::domains::generation::models::{
    GenerationRecord, JobId, RecordId, RecordState, VideoDuration,
};

pub const CAT_PROMPT: &str = "a cat skateboarding";
pub const CAT_URL: &str = "https://cdn.example/cat.mp4";

/// A Draft record that is ready to generate
pub fn ready_record(id: RecordId) -> GenerationRecord {
    GenerationRecord {
        id,
        job_id: None,
        prompt: CAT_PROMPT.to_string(),
        target_id: Some(42),
        target_label: Some("Cats Daily".to_string()),
        state: RecordState::Draft,
        ready_to_generate: true,
        duration: VideoDuration::Ten,
        submitted_at: None,
    }
}

/// A record left Processing by a previous process
pub fn processing_record(
    id: RecordId,
    job_id: Option<&str>,
    submitted_at: Option<DateTime<Utc>>,
) -> GenerationRecord {
    GenerationRecord {
        job_id: job_id.map(JobId::new),
        state: RecordState::Processing,
        submitted_at,
        ..ready_record(id)
    }
}
