pub mod job;
pub mod record;
pub mod snapshot;

pub use job::{GenerationJob, JobId, LifecycleState, RecordId};
pub use record::{
    GenerationRecord, NewScheduledPost, ReadinessStats, RecordPatch, RecordState, VideoDuration,
};
pub use snapshot::{CompletionSignal, SignalOutcome, SignalSource, StatusSnapshot};
