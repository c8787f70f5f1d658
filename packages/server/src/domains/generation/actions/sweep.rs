//! Periodic stale sweep.
//!
//! Catches completions whose webhook never arrived and times out jobs that
//! stayed running past the threshold. The record store is the source of the
//! work list, so jobs submitted by a previous process are covered too.

use futures::stream::{self, StreamExt};
use serde::Serialize;

use super::reconcile::{reconcile_polled, ReconcileOutcome};
use crate::domains::generation::error::GenerationError;
use crate::domains::generation::messages;
use crate::domains::generation::models::{JobId, RecordState};
use crate::kernel::ServerDeps;

/// Vendor status calls in flight at once during a cycle.
pub const MAX_CONCURRENT_CHECKS: usize = 8;

/// Per-cycle counts, sent as one aggregate notification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepSummary {
    pub examined: usize,
    pub completed: usize,
    pub failed: usize,
    pub timed_out: usize,
    pub still_running: usize,
    /// Resolved elsewhere before this cycle got to them.
    pub already_resolved: usize,
    /// Processing records without a job id; submission may still be in flight.
    pub skipped: usize,
    /// Vendor or record-store errors; retried next cycle.
    pub errors: usize,
}

impl SweepSummary {
    fn record(&mut self, outcome: &ReconcileOutcome) {
        match outcome {
            ReconcileOutcome::Completed { .. } => self.completed += 1,
            ReconcileOutcome::Failed { .. } => self.failed += 1,
            ReconcileOutcome::TimedOut { .. } => self.timed_out += 1,
            ReconcileOutcome::StillRunning => self.still_running += 1,
            ReconcileOutcome::Unknown | ReconcileOutcome::AlreadyTerminal => {
                self.already_resolved += 1
            }
        }
    }
}

/// Run one sweep cycle.
///
/// Up to [`MAX_CONCURRENT_CHECKS`] jobs are checked at a time; each one is
/// serialized against webhook reconciliation by its own lease only. Every
/// cycle ends with one summary notification to the default audience, even
/// when nothing was processing.
pub async fn sweep(deps: &ServerDeps) -> Result<SweepSummary, GenerationError> {
    let records = deps.records.find_by_state(RecordState::Processing).await?;

    let mut summary = SweepSummary::default();
    let mut job_ids = Vec::with_capacity(records.len());
    for record in records {
        match record.job_id {
            Some(job_id) => job_ids.push(job_id),
            None => summary.skipped += 1,
        }
    }
    summary.examined = job_ids.len();

    let results: Vec<_> = stream::iter(job_ids)
        .map(|job_id| async move {
            let result = check_job(&job_id, deps).await;
            (job_id, result)
        })
        .buffer_unordered(MAX_CONCURRENT_CHECKS)
        .collect()
        .await;

    for (job_id, result) in results {
        match result {
            Ok(outcome) => summary.record(&outcome),
            Err(e) => {
                summary.errors += 1;
                tracing::warn!(job_id = %job_id, error = %e, "Sweep check failed, retrying next cycle");
            }
        }
    }

    deps.notifier
        .notify(&messages::sweep_summary(&summary), None)
        .await;

    Ok(summary)
}

async fn check_job(
    job_id: &JobId,
    deps: &ServerDeps,
) -> Result<ReconcileOutcome, GenerationError> {
    let snapshot = deps.vendor.fetch_status(job_id).await?;
    reconcile_polled(snapshot.into_signal(job_id.clone()), deps).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::generation::models::{GenerationRecord, StatusSnapshot, VideoDuration};
    use crate::kernel::test_dependencies::MockRecordStore;
    use crate::kernel::TestDependencies;
    use chrono::Utc;
    use std::time::Duration;

    fn processing(id: u64, job_id: Option<&str>) -> GenerationRecord {
        GenerationRecord {
            id,
            job_id: job_id.map(JobId::new),
            prompt: "a cat skateboarding".into(),
            target_id: Some(42),
            target_label: Some("Cats Daily".into()),
            state: RecordState::Processing,
            ready_to_generate: true,
            duration: VideoDuration::Ten,
            submitted_at: Some(Utc::now()),
        }
    }

    #[tokio::test]
    async fn sweep_resolves_every_kind_of_outcome() {
        let mut stale = processing(4, Some("stale"));
        stale.submitted_at = Some(Utc::now() - chrono::Duration::hours(3));

        let test = TestDependencies::new().mock_records(
            MockRecordStore::new()
                .with_record(processing(1, Some("done")))
                .with_record(processing(2, Some("broken")))
                .with_record(processing(3, Some("busy")))
                .with_record(stale)
                .with_record(processing(5, None)),
        );
        test.vendor.set_status(
            "done",
            StatusSnapshot::Completed {
                asset_url: "https://cdn.example/done.mp4".into(),
            },
        );
        test.vendor.set_status(
            "broken",
            StatusSnapshot::Failed {
                error_message: "moderation".into(),
            },
        );
        let deps = test.server_deps();

        let summary = sweep(&deps).await.unwrap();

        assert_eq!(summary.examined, 4);
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.still_running, 1);
        assert_eq!(summary.timed_out, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.errors, 0);

        assert_eq!(test.records.record(5).unwrap().state, RecordState::Processing);
        assert!(deps.registry.contains(&"busy".into()));
        assert_eq!(deps.registry.len(), 1);
        assert_eq!(test.notifier.sent_containing("Sweep summary").len(), 1);
    }

    #[tokio::test]
    async fn vendor_errors_are_retried_next_cycle() {
        let test = TestDependencies::new()
            .mock_records(MockRecordStore::new().with_record(processing(1, Some("flaky"))));
        test.vendor.set_status_error("flaky", "connection reset");
        let deps = test.server_deps();

        let first = sweep(&deps).await.unwrap();
        assert_eq!(first.errors, 1);
        assert_eq!(test.records.record(1).unwrap().state, RecordState::Processing);

        test.vendor.set_status(
            "flaky",
            StatusSnapshot::Completed {
                asset_url: "https://cdn.example/flaky.mp4".into(),
            },
        );
        let second = sweep(&deps).await.unwrap();
        assert_eq!(second.completed, 1);
        assert_eq!(test.records.record(1).unwrap().state, RecordState::Completed);
    }

    #[tokio::test]
    async fn empty_cycle_still_reports() {
        let test = TestDependencies::new();
        let deps = test.server_deps();

        let summary = sweep(&deps).await.unwrap();

        assert_eq!(summary, SweepSummary::default());
        let sent = test.notifier.sent_containing("Sweep summary");
        assert_eq!(sent.len(), 1);
        assert!(sent[0].text.contains("Examined: 0"));
        assert_eq!(sent[0].audience, None);
    }

    #[tokio::test]
    async fn status_checks_are_bounded() {
        let mut records = MockRecordStore::new();
        for id in 1..=20 {
            let job_id = format!("job-{}", id);
            records = records.with_record(processing(id, Some(job_id.as_str())));
        }
        let test = TestDependencies::new().mock_records(records);
        test.vendor.set_status_delay(Duration::from_millis(20));
        let deps = test.server_deps();

        let summary = sweep(&deps).await.unwrap();

        assert_eq!(summary.examined, 20);
        assert_eq!(summary.still_running, 20);
        assert_eq!(test.vendor.status_calls().len(), 20);
        let peak = test.vendor.max_concurrent_status_calls();
        assert!(peak <= MAX_CONCURRENT_CHECKS, "peak {}", peak);
        assert!(peak > 1, "checks ran one by one");
    }
}
