//! In-memory index of in-flight generation jobs.
//!
//! The registry is an acceleration structure only: every entry mirrors a
//! record marked Processing in the system of record, so losing it on a crash
//! loses lookups and chat audiences, never jobs.
//!
//! Mutations for a given job are serialized with [`JobRegistry::lock`]. The
//! lock is per job id, so a slow vendor call while reconciling one job never
//! blocks another.
//!
//! ```text
//! webhook ──┐
//!           ├─► lock(job_id) ─► get / recover ─► patch record ─► remove ─► drop lease
//! sweep ────┘
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::models::{GenerationJob, JobId, RecordId};

type JobLocks = DashMap<JobId, Arc<Mutex<()>>>;

#[derive(Default)]
pub struct JobRegistry {
    jobs: DashMap<JobId, GenerationJob>,
    by_record: DashMap<RecordId, JobId>,
    locks: Arc<JobLocks>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire exclusive access to one job id.
    ///
    /// Works for ids that are not (yet) registered, so a recovery lookup is
    /// serialized with everything else touching that id. Never hold the
    /// lease across unrelated jobs.
    pub async fn lock(&self, job_id: &JobId) -> JobLease {
        let mutex = self
            .locks
            .entry(job_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let guard = mutex.lock_owned().await;

        JobLease {
            job_id: job_id.clone(),
            guard: Some(guard),
            locks: self.locks.clone(),
        }
    }

    /// Insert a job, replacing any entry for the same record.
    ///
    /// Returns the replaced job, if there was one.
    pub fn put(&self, job: GenerationJob) -> Option<GenerationJob> {
        let previous_id = self.by_record.insert(job.record_id, job.job_id.clone());

        let replaced = previous_id
            .filter(|previous| *previous != job.job_id)
            .and_then(|previous| self.jobs.remove(&previous))
            .map(|(_, old)| old);

        if let Some(old) = &replaced {
            tracing::info!(
                record_id = job.record_id,
                old_job_id = %old.job_id,
                new_job_id = %job.job_id,
                "Replacing registry entry for resubmitted record"
            );
        }

        self.jobs.insert(job.job_id.clone(), job);
        replaced
    }

    pub fn get(&self, job_id: &JobId) -> Option<GenerationJob> {
        self.jobs.get(job_id).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, job_id: &JobId) -> bool {
        self.jobs.contains_key(job_id)
    }

    /// Remove a job. Returns `None` if it was already gone.
    pub fn remove(&self, job_id: &JobId) -> Option<GenerationJob> {
        let (_, job) = self.jobs.remove(job_id)?;
        self.by_record
            .remove_if(&job.record_id, |_, indexed| indexed == job_id);
        Some(job)
    }

    /// Record that the vendor still reports the job as running.
    pub fn touch(&self, job_id: &JobId, at: DateTime<Utc>) -> bool {
        match self.jobs.get_mut(job_id) {
            Some(mut entry) => {
                entry.last_seen_at = Some(at);
                true
            }
            None => false,
        }
    }

    pub fn list_all(&self) -> Vec<GenerationJob> {
        let mut jobs: Vec<GenerationJob> =
            self.jobs.iter().map(|entry| entry.value().clone()).collect();
        jobs.sort_by_key(|job| job.submitted_at);
        jobs
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

/// Exclusive access to one job id, released on drop.
pub struct JobLease {
    job_id: JobId,
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<JobLocks>,
}

impl Drop for JobLease {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Only the map holds the mutex now: nobody is waiting, forget it.
        self.locks
            .remove_if(&self.job_id, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}
