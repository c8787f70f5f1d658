use thiserror::Error;

use super::models::{JobId, LifecycleState, RecordId};

/// Submission or status call to the generation vendor failed.
#[derive(Error, Debug)]
pub enum VendorError {
    #[error("Vendor API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Vendor response did not include a job id")]
    MissingJobId,

    #[error("Vendor response malformed: {0}")]
    Malformed(String),

    #[error("Vendor request failed: {0}")]
    Transport(String),
}

/// System-of-record call failed after the credential-refresh retry.
#[derive(Error, Debug)]
pub enum RecordStoreError {
    #[error("Record store API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Record store rejected credentials")]
    Unauthorized,

    #[error("Record store request failed: {0}")]
    Transport(String),
}

/// Coordinator error taxonomy.
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error(transparent)]
    Vendor(#[from] VendorError),

    #[error(transparent)]
    RecordStore(#[from] RecordStoreError),

    #[error("No job or record found for generation {0}")]
    UnknownJob(JobId),

    #[error("Record {record_id} is processing but has no generation id")]
    StructuralFailure { record_id: RecordId },

    #[error("Generation {job_id} still running after {elapsed_minutes} minutes")]
    Timeout { job_id: JobId, elapsed_minutes: i64 },

    #[error("Invalid lifecycle transition for {job_id}: {from} -> {to}")]
    InvalidTransition {
        job_id: JobId,
        from: LifecycleState,
        to: LifecycleState,
    },
}

impl GenerationError {
    /// Errors the next sweep cycle can fix on its own.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            GenerationError::Vendor(_) | GenerationError::RecordStore(_)
        )
    }
}
