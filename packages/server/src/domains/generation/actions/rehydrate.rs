//! Startup recovery of in-flight jobs.

use serde::Serialize;

use crate::domains::generation::error::GenerationError;
use crate::domains::generation::messages;
use crate::domains::generation::models::{
    GenerationJob, GenerationRecord, RecordPatch, RecordState,
};
use crate::kernel::ServerDeps;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RehydrationReport {
    pub recovered: usize,
    pub structural_failures: usize,
    /// Records whose failure could not be saved; retried on the next start.
    pub errors: usize,
}

/// Rebuild the registry from every record marked Processing.
///
/// Records with a stored job id come back as `Recovering` jobs. Records
/// without one can never be matched to a vendor job, so they fail right away
/// with a diagnostic notification and no vendor call.
pub async fn rehydrate(deps: &ServerDeps) -> Result<RehydrationReport, GenerationError> {
    let records = deps.records.find_by_state(RecordState::Processing).await?;
    let mut report = RehydrationReport::default();

    for record in records {
        match record.job_id.clone() {
            Some(job_id) => {
                let _lease = deps.registry.lock(&job_id).await;
                if deps.registry.contains(&job_id) {
                    continue;
                }
                deps.registry.put(GenerationJob::recovered(&record, job_id.clone()));
                report.recovered += 1;

                tracing::info!(
                    job_id = %job_id,
                    record_id = record.id,
                    "Rehydrated in-flight job"
                );
            }
            None => match fail_structurally(&record, deps).await {
                Ok(()) => report.structural_failures += 1,
                Err(e) => {
                    report.errors += 1;
                    tracing::error!(
                        record_id = record.id,
                        error = %e,
                        "Could not mark unrecoverable record as failed"
                    );
                }
            },
        }
    }

    tracing::info!(
        recovered = report.recovered,
        structural_failures = report.structural_failures,
        errors = report.errors,
        "Rehydration finished"
    );

    if report.recovered > 0 || report.structural_failures > 0 {
        deps.notifier
            .notify(&messages::rehydration_finished(&report), None)
            .await;
    }

    Ok(report)
}

async fn fail_structurally(
    record: &GenerationRecord,
    deps: &ServerDeps,
) -> Result<(), GenerationError> {
    deps.records.patch(record.id, &RecordPatch::failed()).await?;

    tracing::error!(
        record_id = record.id,
        "{}",
        GenerationError::StructuralFailure {
            record_id: record.id
        }
    );

    deps.notifier
        .notify(&messages::structural_failure(record.id), None)
        .await;
    Ok(())
}
