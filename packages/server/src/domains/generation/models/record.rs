//! System-of-record view of a generation request.
//!
//! The record store owns these rows; the coordinator only reads them and
//! sends [`RecordPatch`]es.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use super::job::{JobId, RecordId};

/// Status column of a generation record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum RecordState {
    #[default]
    Draft,
    Processing,
    Completed,
    Error,
}

impl RecordState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RecordState::Completed | RecordState::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordState::Draft => "Draft",
            RecordState::Processing => "Processing",
            RecordState::Completed => "Completed",
            RecordState::Error => "Error",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "Draft" => Some(RecordState::Draft),
            "Processing" => Some(RecordState::Processing),
            "Completed" => Some(RecordState::Completed),
            "Error" => Some(RecordState::Error),
            _ => None,
        }
    }
}

/// Clip length accepted by the vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum VideoDuration {
    #[default]
    Ten,
    Fifteen,
}

impl VideoDuration {
    pub fn seconds(&self) -> u32 {
        match self {
            VideoDuration::Ten => 10,
            VideoDuration::Fifteen => 15,
        }
    }

    /// Parse values like `"15s"` or `"15"`. Anything other than 15 is 10.
    pub fn parse(raw: &str) -> Self {
        let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
        match digits.parse::<u32>() {
            Ok(15) => VideoDuration::Fifteen,
            _ => VideoDuration::Ten,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRecord {
    pub id: RecordId,
    pub job_id: Option<JobId>,
    pub prompt: String,
    pub target_id: Option<u64>,
    pub target_label: Option<String>,
    pub state: RecordState,
    pub ready_to_generate: bool,
    pub duration: VideoDuration,
    pub submitted_at: Option<DateTime<Utc>>,
}

impl GenerationRecord {
    pub fn is_ready(&self) -> bool {
        self.ready_to_generate
            && self.state == RecordState::Draft
            && !self.prompt.trim().is_empty()
            && self.target_id.is_some()
    }
}

/// Why records were or were not picked up by a generate request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReadinessStats {
    pub total: usize,
    pub not_ready: usize,
    pub not_draft: usize,
    pub no_prompt: usize,
    pub no_target: usize,
    pub ready: usize,
}

impl ReadinessStats {
    /// Split records into the ready ones plus exclusion counts.
    ///
    /// One record can count toward several exclusion reasons.
    pub fn tally(records: Vec<GenerationRecord>) -> (Vec<GenerationRecord>, Self) {
        let mut stats = ReadinessStats {
            total: records.len(),
            ..Default::default()
        };

        let ready: Vec<GenerationRecord> = records
            .into_iter()
            .filter(|record| {
                if !record.ready_to_generate {
                    stats.not_ready += 1;
                }
                if record.state != RecordState::Draft {
                    stats.not_draft += 1;
                }
                if record.prompt.trim().is_empty() {
                    stats.no_prompt += 1;
                }
                if record.target_id.is_none() {
                    stats.no_target += 1;
                }
                record.is_ready()
            })
            .collect();

        stats.ready = ready.len();
        (ready, stats)
    }
}

/// Field changes sent to the system of record in a single call.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecordPatch {
    pub state: Option<RecordState>,
    pub job_id: Option<JobId>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub video_url: Option<String>,
    pub clear_ready_flag: bool,
}

impl RecordPatch {
    pub fn processing() -> Self {
        Self {
            state: Some(RecordState::Processing),
            ..Default::default()
        }
    }

    /// Persist the vendor id so a restart can find the job again.
    pub fn submitted(job_id: JobId, at: DateTime<Utc>) -> Self {
        Self {
            job_id: Some(job_id),
            submitted_at: Some(at),
            ..Default::default()
        }
    }

    pub fn completed(video_url: impl Into<String>) -> Self {
        Self {
            state: Some(RecordState::Completed),
            video_url: Some(video_url.into()),
            clear_ready_flag: true,
            ..Default::default()
        }
    }

    pub fn failed() -> Self {
        Self {
            state: Some(RecordState::Error),
            ..Default::default()
        }
    }
}

/// Derived post-queue entry created after a successful generation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewScheduledPost {
    pub source_record_id: RecordId,
    pub target_id: Option<u64>,
    pub video_url: String,
    pub caption: String,
    pub schedule_for: DateTime<FixedOffset>,
}
