pub mod reconcile;
pub mod rehydrate;
pub mod submit;
pub mod sweep;

pub use reconcile::{reconcile, reconcile_polled, ReconcileOutcome};
pub use rehydrate::{rehydrate, RehydrationReport};
pub use submit::{submit_ready_records, SubmissionReport};
pub use sweep::{sweep, SweepSummary};
