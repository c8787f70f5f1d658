//! Normalized completion signals.
//!
//! Webhook deliveries and poll results both become a [`CompletionSignal`]
//! before they reach the reconciler.

use serde::{Deserialize, Serialize};

use super::job::JobId;

/// What the vendor says right now about one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StatusSnapshot {
    Running { progress: Option<f64> },
    Completed { asset_url: String },
    Failed { error_message: String },
}

impl StatusSnapshot {
    pub fn into_signal(self, job_id: JobId) -> CompletionSignal {
        let outcome = match self {
            StatusSnapshot::Running { .. } => SignalOutcome::StillRunning,
            StatusSnapshot::Completed { asset_url } => SignalOutcome::Completed { asset_url },
            StatusSnapshot::Failed { error_message } => SignalOutcome::Failed {
                error_message,
                error_code: None,
            },
        };

        CompletionSignal {
            job_id,
            outcome,
            source: SignalSource::Poll,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalSource {
    Webhook,
    Poll,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SignalOutcome {
    Completed {
        asset_url: String,
    },
    Failed {
        error_message: String,
        error_code: Option<String>,
    },
    StillRunning,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionSignal {
    pub job_id: JobId,
    pub outcome: SignalOutcome,
    pub source: SignalSource,
}

impl CompletionSignal {
    pub fn completed(job_id: impl Into<JobId>, asset_url: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            outcome: SignalOutcome::Completed {
                asset_url: asset_url.into(),
            },
            source: SignalSource::Webhook,
        }
    }

    pub fn failed(
        job_id: impl Into<JobId>,
        error_message: impl Into<String>,
        error_code: Option<String>,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            outcome: SignalOutcome::Failed {
                error_message: error_message.into(),
                error_code,
            },
            source: SignalSource::Webhook,
        }
    }
}
