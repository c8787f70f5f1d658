//! Completion reconciliation.
//!
//! Every completion signal, pushed by the webhook or pulled by the sweep,
//! goes through [`reconcile`]. Under the per-job lease it resolves the job
//! (registry first, then the record store), performs at most one terminal
//! transition with exactly one record mutation, and removes the job from the
//! registry. Notifications and the post-queue side effect run after the lease
//! is released: by then the record is terminal, so a duplicate signal abstains.

use chrono::{DateTime, FixedOffset, Utc};

use crate::common::next_available_slot;
use crate::domains::generation::error::GenerationError;
use crate::domains::generation::messages;
use crate::domains::generation::models::{
    CompletionSignal, GenerationJob, JobId, LifecycleState, NewScheduledPost, RecordId,
    RecordPatch, SignalOutcome,
};
use crate::kernel::{ServerDeps, FALLBACK_CAPTION};

/// What a reconciliation did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Completed { record_id: RecordId, degraded: bool },
    Failed { record_id: RecordId },
    TimedOut { record_id: RecordId },
    StillRunning,
    /// No registry entry and no record carries this job id.
    Unknown,
    /// The record already reached a terminal state.
    AlreadyTerminal,
}

impl ReconcileOutcome {
    pub fn is_terminal_transition(&self) -> bool {
        matches!(
            self,
            ReconcileOutcome::Completed { .. }
                | ReconcileOutcome::Failed { .. }
                | ReconcileOutcome::TimedOut { .. }
        )
    }
}

enum Resolved {
    Tracked(GenerationJob),
    Recovered(GenerationJob),
    Unknown,
    AlreadyTerminal,
}

/// Reconcile a signal without a staleness check (webhook path).
pub async fn reconcile(
    signal: CompletionSignal,
    deps: &ServerDeps,
) -> Result<ReconcileOutcome, GenerationError> {
    reconcile_signal(signal, false, deps).await
}

/// Reconcile a polled signal. Still-running jobs older than
/// `deps.stale_after` are timed out under the same lease.
pub async fn reconcile_polled(
    signal: CompletionSignal,
    deps: &ServerDeps,
) -> Result<ReconcileOutcome, GenerationError> {
    reconcile_signal(signal, true, deps).await
}

async fn reconcile_signal(
    signal: CompletionSignal,
    check_staleness: bool,
    deps: &ServerDeps,
) -> Result<ReconcileOutcome, GenerationError> {
    let CompletionSignal {
        job_id,
        outcome,
        source,
    } = signal;

    let lease = deps.registry.lock(&job_id).await;

    let (mut job, recovered) = match resolve(&job_id, deps).await? {
        Resolved::Tracked(job) => (job, false),
        Resolved::Recovered(job) => (job, true),
        Resolved::Unknown => {
            tracing::warn!(
                job_id = %job_id,
                source = ?source,
                "{}, discarding signal",
                GenerationError::UnknownJob(job_id.clone())
            );
            return Ok(ReconcileOutcome::Unknown);
        }
        Resolved::AlreadyTerminal => {
            tracing::debug!(job_id = %job_id, source = ?source, "Record already terminal, ignoring signal");
            return Ok(ReconcileOutcome::AlreadyTerminal);
        }
    };

    match outcome {
        SignalOutcome::Completed { asset_url } => {
            job.transition(LifecycleState::Completed)?;
            // Point of no return: once this lands the job is done.
            deps.records
                .patch(job.record_id, &RecordPatch::completed(asset_url.as_str()))
                .await?;
            deps.registry.remove(&job_id);
            drop(lease);

            tracing::info!(
                job_id = %job_id,
                record_id = job.record_id,
                source = ?source,
                "Generation completed"
            );

            let degraded = match publish_completion(&job, &asset_url, deps).await {
                Ok((caption, slot)) => {
                    let text = messages::generation_completed(&job, &asset_url, &caption, slot);
                    deps.notifier
                        .notify(&text, job.notify_audience.as_deref())
                        .await;
                    false
                }
                Err(e) => {
                    tracing::error!(
                        job_id = %job_id,
                        record_id = job.record_id,
                        error = %e,
                        "Record saved but post-queue side effect failed"
                    );
                    let text = messages::completion_degraded(&job, &asset_url, &e.to_string());
                    deps.notifier
                        .notify(&text, job.notify_audience.as_deref())
                        .await;
                    true
                }
            };

            Ok(ReconcileOutcome::Completed {
                record_id: job.record_id,
                degraded,
            })
        }

        SignalOutcome::Failed {
            error_message,
            error_code,
        } => {
            job.transition(LifecycleState::Failed)?;
            deps.records
                .patch(job.record_id, &RecordPatch::failed())
                .await?;
            deps.registry.remove(&job_id);
            drop(lease);

            tracing::warn!(
                job_id = %job_id,
                record_id = job.record_id,
                source = ?source,
                error = %error_message,
                "Generation failed"
            );

            let text = messages::generation_failed(&job, &error_message, error_code.as_deref());
            deps.notifier
                .notify(&text, job.notify_audience.as_deref())
                .await;

            Ok(ReconcileOutcome::Failed {
                record_id: job.record_id,
            })
        }

        SignalOutcome::StillRunning => {
            let now = Utc::now();

            if check_staleness && job.is_stale(now, deps.stale_after) {
                let elapsed_minutes = job.elapsed(now).num_minutes();
                job.transition(LifecycleState::TimedOut)?;
                deps.records
                    .patch(job.record_id, &RecordPatch::failed())
                    .await?;
                deps.registry.remove(&job_id);
                drop(lease);

                tracing::warn!(
                    record_id = job.record_id,
                    "{}",
                    GenerationError::Timeout {
                        job_id: job_id.clone(),
                        elapsed_minutes,
                    }
                );

                let text = messages::generation_timed_out(&job, elapsed_minutes);
                deps.notifier
                    .notify(&text, job.notify_audience.as_deref())
                    .await;

                return Ok(ReconcileOutcome::TimedOut {
                    record_id: job.record_id,
                });
            }

            if recovered {
                job.last_seen_at = Some(now);
                deps.registry.put(job);
            } else {
                deps.registry.touch(&job_id, now);
            }

            Ok(ReconcileOutcome::StillRunning)
        }
    }
}

/// Registry first; on a miss, rebuild a minimal job from the record store.
async fn resolve(job_id: &JobId, deps: &ServerDeps) -> Result<Resolved, GenerationError> {
    if let Some(job) = deps.registry.get(job_id) {
        return Ok(Resolved::Tracked(job));
    }

    let Some(record) = deps.records.find_by_job_id(job_id).await? else {
        return Ok(Resolved::Unknown);
    };

    if record.state.is_terminal() {
        return Ok(Resolved::AlreadyTerminal);
    }

    tracing::info!(
        job_id = %job_id,
        record_id = record.id,
        "Recovered job from record store"
    );
    Ok(Resolved::Recovered(GenerationJob::recovered(
        &record,
        job_id.clone(),
    )))
}

/// Caption plus post-queue entry for a completed generation.
async fn publish_completion(
    job: &GenerationJob,
    asset_url: &str,
    deps: &ServerDeps,
) -> Result<(String, DateTime<FixedOffset>), GenerationError> {
    let caption = match deps.captions.write_caption(&job.prompt).await {
        Ok(caption) => caption,
        Err(e) => {
            tracing::warn!(job_id = %job.job_id, error = %e, "Caption failed, using fallback");
            FALLBACK_CAPTION.to_string()
        }
    };

    let taken = deps.records.scheduled_post_slots().await?;
    let schedule_for = next_available_slot(&taken, Utc::now());

    deps.records
        .create_scheduled_post(&NewScheduledPost {
            source_record_id: job.record_id,
            target_id: job.target_id,
            video_url: asset_url.to_string(),
            caption: caption.clone(),
            schedule_for,
        })
        .await?;

    Ok((caption, schedule_for))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::generation::models::{
        GenerationRecord, RecordState, StatusSnapshot, VideoDuration,
    };
    use crate::kernel::test_dependencies::{MockCaptionWriter, MockRecordStore};
    use crate::kernel::TestDependencies;

    fn processing_record(id: RecordId, job_id: &str) -> GenerationRecord {
        GenerationRecord {
            id,
            job_id: Some(JobId::new(job_id)),
            prompt: "a cat skateboarding".into(),
            target_id: Some(42),
            target_label: Some("Cats Daily".into()),
            state: RecordState::Processing,
            ready_to_generate: true,
            duration: VideoDuration::Ten,
            submitted_at: Some(Utc::now()),
        }
    }

    fn tracked_job(record: &GenerationRecord, audience: &str) -> GenerationJob {
        GenerationJob::builder()
            .job_id(record.job_id.clone().unwrap())
            .record_id(record.id)
            .prompt(record.prompt.clone())
            .target_id(42u64)
            .target_label("Cats Daily".to_string())
            .notify_audience(audience.to_string())
            .build()
    }

    #[tokio::test]
    async fn completion_patches_once_and_notifies_requester() {
        let record = processing_record(1, "abc123");
        let test = TestDependencies::new()
            .mock_records(MockRecordStore::new().with_record(record.clone()));
        let deps = test.server_deps();
        deps.registry.put(tracked_job(&record, "chat-1"));

        let outcome = reconcile(CompletionSignal::completed("abc123", "https://cdn.example/cat.mp4"), &deps)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            ReconcileOutcome::Completed {
                record_id: 1,
                degraded: false
            }
        );
        assert!(deps.registry.is_empty());
        assert_eq!(test.records.terminal_patches(1).len(), 1);
        assert_eq!(test.records.record(1).unwrap().state, RecordState::Completed);
        assert!(!test.records.record(1).unwrap().ready_to_generate);

        let posts = test.records.posts();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].target_id, Some(42));
        assert_eq!(test.captions.calls(), vec!["a cat skateboarding".to_string()]);

        let sent = test.notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].audience.as_deref(), Some("chat-1"));
        assert!(sent[0].text.contains("abc123"));
    }

    #[tokio::test]
    async fn duplicate_completion_is_absorbed() {
        let record = processing_record(1, "abc123");
        let test = TestDependencies::new()
            .mock_records(MockRecordStore::new().with_record(record.clone()));
        let deps = test.server_deps();
        deps.registry.put(tracked_job(&record, "chat-1"));

        let signal = CompletionSignal::completed("abc123", "https://cdn.example/cat.mp4");
        reconcile(signal.clone(), &deps).await.unwrap();
        let second = reconcile(signal, &deps).await.unwrap();

        assert_eq!(second, ReconcileOutcome::AlreadyTerminal);
        assert_eq!(test.records.terminal_patches(1).len(), 1);
        assert_eq!(test.records.posts().len(), 1);
        assert_eq!(test.notifier.sent().len(), 1);
    }

    #[tokio::test]
    async fn unknown_job_is_discarded() {
        let test = TestDependencies::new();
        let deps = test.server_deps();

        let outcome = reconcile(CompletionSignal::failed("nope", "boom", None), &deps)
            .await
            .unwrap();

        assert_eq!(outcome, ReconcileOutcome::Unknown);
        assert!(test.records.patches().is_empty());
        assert!(test.notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn registry_miss_recovers_from_record_and_uses_default_audience() {
        let record = processing_record(5, "lost-job");
        let test = TestDependencies::new()
            .mock_records(MockRecordStore::new().with_record(record));
        let deps = test.server_deps();

        let outcome = reconcile(
            CompletionSignal::failed("lost-job", "content_policy", Some("E42".into())),
            &deps,
        )
        .await
        .unwrap();

        assert_eq!(outcome, ReconcileOutcome::Failed { record_id: 5 });
        assert_eq!(test.records.record(5).unwrap().state, RecordState::Error);

        let sent = test.notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].audience, None);
        assert!(sent[0].text.contains("Code: E42"));
    }

    #[tokio::test]
    async fn failed_patch_keeps_job_for_retry() {
        let record = processing_record(1, "abc123");
        let test = TestDependencies::new()
            .mock_records(MockRecordStore::new().with_record(record.clone()));
        let deps = test.server_deps();
        deps.registry.put(tracked_job(&record, "chat-1"));
        test.records.fail_next_patches(1);

        let err = reconcile(CompletionSignal::completed("abc123", "https://cdn.example/cat.mp4"), &deps)
            .await
            .unwrap_err();

        assert!(err.is_transient());
        assert!(deps.registry.contains(&"abc123".into()));
        assert_eq!(deps.registry.get(&"abc123".into()).unwrap().state, LifecycleState::Generating);
        assert!(test.notifier.sent().is_empty());

        let retry = reconcile(CompletionSignal::completed("abc123", "https://cdn.example/cat.mp4"), &deps)
            .await
            .unwrap();
        assert!(retry.is_terminal_transition());
    }

    #[tokio::test]
    async fn side_effect_failure_sends_degraded_notification() {
        let record = processing_record(1, "abc123");
        let test = TestDependencies::new()
            .mock_records(MockRecordStore::new().with_record(record.clone()))
            .mock_captions(MockCaptionWriter::failing());
        let deps = test.server_deps();
        deps.registry.put(tracked_job(&record, "chat-1"));
        test.records.fail_post_creation(true);

        let outcome = reconcile(CompletionSignal::completed("abc123", "https://cdn.example/cat.mp4"), &deps)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            ReconcileOutcome::Completed {
                record_id: 1,
                degraded: true
            }
        );
        assert_eq!(test.records.record(1).unwrap().state, RecordState::Completed);

        let sent = test.notifier.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].text.contains("notification pipeline failed"));
        assert!(sent[0].text.contains("abc123"));
    }

    #[tokio::test]
    async fn still_running_updates_last_seen() {
        let record = processing_record(1, "abc123");
        let test = TestDependencies::new()
            .mock_records(MockRecordStore::new().with_record(record.clone()));
        let deps = test.server_deps();
        deps.registry.put(tracked_job(&record, "chat-1"));

        let signal = StatusSnapshot::Running { progress: Some(50.0) }.into_signal("abc123".into());
        let outcome = reconcile_polled(signal, &deps).await.unwrap();

        assert_eq!(outcome, ReconcileOutcome::StillRunning);
        assert!(deps.registry.get(&"abc123".into()).unwrap().last_seen_at.is_some());
        assert!(test.records.patches().is_empty());
        assert!(test.notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn stale_poll_times_out() {
        let mut record = processing_record(1, "abc123");
        record.submitted_at = Some(Utc::now() - chrono::Duration::hours(2));
        let test = TestDependencies::new()
            .mock_records(MockRecordStore::new().with_record(record));
        let deps = test.server_deps();

        let signal = StatusSnapshot::Running { progress: None }.into_signal("abc123".into());
        let outcome = reconcile_polled(signal, &deps).await.unwrap();

        assert_eq!(outcome, ReconcileOutcome::TimedOut { record_id: 1 });
        assert_eq!(test.records.record(1).unwrap().state, RecordState::Error);
        assert!(deps.registry.is_empty());
        assert_eq!(test.notifier.sent_containing("Timed Out").len(), 1);
    }

    #[tokio::test]
    async fn webhook_still_running_never_times_out() {
        let mut record = processing_record(1, "abc123");
        record.submitted_at = Some(Utc::now() - chrono::Duration::hours(2));
        let test = TestDependencies::new()
            .mock_records(MockRecordStore::new().with_record(record));
        let deps = test.server_deps();

        let signal = StatusSnapshot::Running { progress: None }.into_signal("abc123".into());
        let outcome = reconcile(signal, &deps).await.unwrap();

        assert_eq!(outcome, ReconcileOutcome::StillRunning);
        assert_eq!(
            deps.registry.get(&"abc123".into()).unwrap().state,
            LifecycleState::Recovering
        );
    }
}
