//! Generation job model and lifecycle state machine.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use super::record::GenerationRecord;
use crate::domains::generation::error::GenerationError;

/// Row id in the system of record. Stable and never reused.
pub type RecordId = u64;

/// Opaque identifier the vendor assigns when a generation is submitted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 characters, for chat messages.
    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(12) {
            Some((idx, _)) => &self.0[..idx],
            None => &self.0,
        }
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for JobId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// ============================================================================
// Lifecycle
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// Submitted by this process; the audience is known.
    #[default]
    Generating,
    /// Rebuilt from the system of record after the in-memory entry was lost.
    Recovering,
    Completed,
    Failed,
    TimedOut,
}

impl LifecycleState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LifecycleState::Completed | LifecycleState::Failed | LifecycleState::TimedOut
        )
    }

    /// Only `{Generating|Recovering} -> {Completed|Failed|TimedOut}` is allowed.
    pub fn can_transition_to(&self, next: LifecycleState) -> bool {
        !self.is_terminal() && next.is_terminal()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Generating => "generating",
            LifecycleState::Recovering => "recovering",
            LifecycleState::Completed => "completed",
            LifecycleState::Failed => "failed",
            LifecycleState::TimedOut => "timed_out",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Job Model
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[builder(field_defaults(setter(into)))]
pub struct GenerationJob {
    pub job_id: JobId,
    pub record_id: RecordId,

    // Needed later for the caption
    #[builder(default)]
    pub prompt: String,

    // Destination page
    #[builder(default, setter(strip_option))]
    pub target_id: Option<u64>,
    #[builder(default, setter(strip_option))]
    pub target_label: Option<String>,

    #[builder(default)]
    pub state: LifecycleState,
    #[builder(default = Utc::now())]
    pub submitted_at: DateTime<Utc>,
    #[builder(default, setter(strip_option))]
    pub last_seen_at: Option<DateTime<Utc>>,

    /// Chat to notify. `None` means the default audience.
    #[builder(default, setter(strip_option))]
    pub notify_audience: Option<String>,
}

impl GenerationJob {
    /// Minimal job rebuilt from a record, used after the registry entry was lost.
    ///
    /// The audience is gone with the process; a missing submission time
    /// restarts the staleness clock.
    pub fn recovered(record: &GenerationRecord, job_id: JobId) -> Self {
        Self {
            job_id,
            record_id: record.id,
            prompt: record.prompt.clone(),
            target_id: record.target_id,
            target_label: record.target_label.clone(),
            state: LifecycleState::Recovering,
            submitted_at: record.submitted_at.unwrap_or_else(Utc::now),
            last_seen_at: None,
            notify_audience: None,
        }
    }

    pub fn transition(&mut self, next: LifecycleState) -> Result<(), GenerationError> {
        if !self.state.can_transition_to(next) {
            return Err(GenerationError::InvalidTransition {
                job_id: self.job_id.clone(),
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }

    pub fn elapsed(&self, now: DateTime<Utc>) -> chrono::Duration {
        now.signed_duration_since(self.submitted_at)
    }

    pub fn is_stale(&self, now: DateTime<Utc>, stale_after: Duration) -> bool {
        match chrono::Duration::from_std(stale_after) {
            Ok(threshold) => self.elapsed(now) > threshold,
            Err(_) => false,
        }
    }

    pub fn target_label(&self) -> &str {
        self.target_label.as_deref().unwrap_or("Unknown")
    }
}
