//! Submission of ready records to the vendor.

use chrono::Utc;
use serde::Serialize;

use crate::domains::generation::error::{GenerationError, RecordStoreError, VendorError};
use crate::domains::generation::messages;
use crate::domains::generation::models::{
    GenerationJob, GenerationRecord, JobId, LifecycleState, ReadinessStats, RecordPatch,
};
use crate::kernel::ServerDeps;

#[derive(Debug, Clone, Default, Serialize)]
pub struct SubmissionReport {
    pub stats: ReadinessStats,
    pub submitted: Vec<JobId>,
    pub failed: usize,
}

/// A submission that was aborted part way through.
struct SubmissionFailure {
    job_id: Option<JobId>,
    error: GenerationError,
}

impl From<VendorError> for SubmissionFailure {
    fn from(error: VendorError) -> Self {
        Self {
            job_id: None,
            error: error.into(),
        }
    }
}

impl From<RecordStoreError> for SubmissionFailure {
    fn from(error: RecordStoreError) -> Self {
        Self {
            job_id: None,
            error: error.into(),
        }
    }
}

/// Submit every ready record, one at a time.
///
/// `requester` is the chat that asked; it becomes the audience of every job
/// submitted here. Records are ready when Ready To Generate is checked, the
/// status is Draft, and both Prompt and Target Page are set.
pub async fn submit_ready_records(
    requester: Option<&str>,
    deps: &ServerDeps,
) -> Result<SubmissionReport, GenerationError> {
    let records = deps.records.list_generation_records().await?;
    let (ready, stats) = ReadinessStats::tally(records);

    let mut report = SubmissionReport {
        stats,
        ..Default::default()
    };

    tracing::info!(
        total = stats.total,
        ready = stats.ready,
        "Collected generation records"
    );

    if ready.is_empty() {
        deps.notifier
            .notify(&messages::no_ready_records(&stats), requester)
            .await;
        return Ok(report);
    }

    deps.notifier
        .notify(&messages::submission_plan(ready.len()), requester)
        .await;

    for record in ready {
        match submit_record(&record, requester, deps).await {
            Ok(job_id) => report.submitted.push(job_id),
            Err(failure) => {
                report.failed += 1;
                abort_submission(&record, failure, requester, deps).await;
            }
        }
    }

    if report.stats.ready > 1 {
        deps.notifier
            .notify(&messages::submission_finished(&report), requester)
            .await;
    }

    Ok(report)
}

async fn submit_record(
    record: &GenerationRecord,
    requester: Option<&str>,
    deps: &ServerDeps,
) -> Result<JobId, SubmissionFailure> {
    deps.records
        .patch(record.id, &RecordPatch::processing())
        .await?;

    tracing::info!(
        record_id = record.id,
        duration = record.duration.seconds(),
        "Submitting generation"
    );
    let job_id = deps
        .vendor
        .submit(&record.prompt, record.duration)
        .await?;

    let submitted_at = Utc::now();
    {
        let _lease = deps.registry.lock(&job_id).await;

        // Persist the id first: a restart can only find jobs through it.
        deps.records
            .patch(record.id, &RecordPatch::submitted(job_id.clone(), submitted_at))
            .await
            .map_err(|e| SubmissionFailure {
                job_id: Some(job_id.clone()),
                error: e.into(),
            })?;

        deps.registry.put(GenerationJob {
            job_id: job_id.clone(),
            record_id: record.id,
            prompt: record.prompt.clone(),
            target_id: record.target_id,
            target_label: record.target_label.clone(),
            state: LifecycleState::Generating,
            submitted_at,
            last_seen_at: None,
            notify_audience: requester.map(str::to_string),
        });
    }

    tracing::info!(
        job_id = %job_id,
        record_id = record.id,
        "Generation submitted"
    );

    if let Some(job) = deps.registry.get(&job_id) {
        deps.notifier
            .notify(&messages::generation_started(&job), requester)
            .await;
    }

    Ok(job_id)
}

/// Mark the record failed and tell the requester.
async fn abort_submission(
    record: &GenerationRecord,
    failure: SubmissionFailure,
    requester: Option<&str>,
    deps: &ServerDeps,
) {
    tracing::error!(
        record_id = record.id,
        job_id = failure.job_id.as_ref().map(|id| id.as_str()),
        error = %failure.error,
        "Submission failed"
    );

    if let Err(e) = deps.records.patch(record.id, &RecordPatch::failed()).await {
        tracing::error!(record_id = record.id, error = %e, "Could not mark record as failed");
    }

    let text = messages::submission_failed(
        record.id,
        failure.job_id.as_ref(),
        &failure.error.to_string(),
    );
    deps.notifier.notify(&text, requester).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::generation::models::{RecordState, VideoDuration};
    use crate::kernel::test_dependencies::{MockRecordStore, MockVideoGenerator};
    use crate::kernel::TestDependencies;

    fn draft(id: u64, ready: bool) -> GenerationRecord {
        GenerationRecord {
            id,
            job_id: None,
            prompt: "a cat skateboarding".into(),
            target_id: Some(42),
            target_label: Some("Cats Daily".into()),
            state: RecordState::Draft,
            ready_to_generate: ready,
            duration: VideoDuration::Fifteen,
            submitted_at: None,
        }
    }

    #[tokio::test]
    async fn submits_ready_records_and_registers_jobs() {
        let test = TestDependencies::new()
            .mock_vendor(MockVideoGenerator::new().with_job_id("abc123"))
            .mock_records(
                MockRecordStore::new()
                    .with_record(draft(1, true))
                    .with_record(draft(2, false)),
            );
        let deps = test.server_deps();

        let report = submit_ready_records(Some("chat-1"), &deps).await.unwrap();

        assert_eq!(report.submitted, vec![JobId::new("abc123")]);
        assert_eq!(report.stats.not_ready, 1);
        assert_eq!(
            test.vendor.submit_calls(),
            vec![("a cat skateboarding".to_string(), VideoDuration::Fifteen)]
        );

        let record = test.records.record(1).unwrap();
        assert_eq!(record.state, RecordState::Processing);
        assert_eq!(record.job_id, Some(JobId::new("abc123")));
        assert!(record.submitted_at.is_some());

        let job = deps.registry.get(&"abc123".into()).unwrap();
        assert_eq!(job.state, LifecycleState::Generating);
        assert_eq!(job.notify_audience.as_deref(), Some("chat-1"));
        assert_eq!(job.target_id, Some(42));

        assert_eq!(test.notifier.sent_containing("Started").len(), 1);
    }

    #[tokio::test]
    async fn vendor_error_marks_record_failed() {
        let test = TestDependencies::new()
            .mock_vendor(MockVideoGenerator::new().with_submit_error(VendorError::Api {
                status: 500,
                message: "overloaded".into(),
            }))
            .mock_records(MockRecordStore::new().with_record(draft(1, true)));
        let deps = test.server_deps();

        let report = submit_ready_records(Some("chat-1"), &deps).await.unwrap();

        assert_eq!(report.failed, 1);
        assert!(report.submitted.is_empty());
        assert!(deps.registry.is_empty());
        assert_eq!(test.records.record(1).unwrap().state, RecordState::Error);
        assert_eq!(test.notifier.sent_containing("Error on record 1").len(), 1);
    }

    #[tokio::test]
    async fn failure_to_persist_job_id_aborts_with_id_in_message() {
        let test = TestDependencies::new()
            .mock_vendor(MockVideoGenerator::new().with_job_id("orphan"))
            .mock_records(MockRecordStore::new().with_record(draft(1, true)));
        test.records.fail_job_id_patches(true);
        let deps = test.server_deps();

        let report = submit_ready_records(Some("chat-1"), &deps).await.unwrap();

        assert_eq!(report.failed, 1);
        assert!(deps.registry.is_empty());
        assert_eq!(test.records.record(1).unwrap().state, RecordState::Error);
        assert_eq!(test.notifier.sent_containing("orphan").len(), 1);
    }

    #[tokio::test]
    async fn nothing_ready_reports_exclusions() {
        let test = TestDependencies::new()
            .mock_records(MockRecordStore::new().with_record(draft(1, false)));
        let deps = test.server_deps();

        let report = submit_ready_records(None, &deps).await.unwrap();

        assert!(report.submitted.is_empty());
        assert!(test.vendor.submit_calls().is_empty());
        assert_eq!(
            test.notifier
                .sent_containing("Ready To Generate unchecked: 1")
                .len(),
            1
        );
    }
}
