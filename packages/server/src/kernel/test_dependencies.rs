// TestDependencies - mock implementations for testing
//
// Provides recording mocks that can be injected into ServerDeps for tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{BaseCaptionWriter, BaseNotifier, BaseRecordStore, BaseVideoGenerator, ServerDeps};
use crate::domains::generation::error::{RecordStoreError, VendorError};
use crate::domains::generation::models::{
    GenerationRecord, JobId, NewScheduledPost, RecordId, RecordPatch, RecordState,
    StatusSnapshot, VideoDuration,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// Mock Video Generator
// =============================================================================

#[derive(Debug, Clone)]
enum MockStatus {
    Snapshot(StatusSnapshot),
    Error(String),
}

pub struct MockVideoGenerator {
    job_ids: Mutex<VecDeque<String>>,
    submit_errors: Mutex<VecDeque<VendorError>>,
    statuses: Mutex<HashMap<JobId, MockStatus>>,
    submit_calls: Mutex<Vec<(String, VideoDuration)>>,
    status_calls: Mutex<Vec<JobId>>,
    status_delay: Mutex<Option<Duration>>,
    status_in_flight: AtomicUsize,
    status_peak: AtomicUsize,
    counter: AtomicUsize,
}

impl MockVideoGenerator {
    pub fn new() -> Self {
        Self {
            job_ids: Mutex::new(VecDeque::new()),
            submit_errors: Mutex::new(VecDeque::new()),
            statuses: Mutex::new(HashMap::new()),
            submit_calls: Mutex::new(Vec::new()),
            status_calls: Mutex::new(Vec::new()),
            status_delay: Mutex::new(None),
            status_in_flight: AtomicUsize::new(0),
            status_peak: AtomicUsize::new(0),
            counter: AtomicUsize::new(0),
        }
    }

    /// Job id returned by the next submission
    pub fn with_job_id(self, job_id: &str) -> Self {
        lock(&self.job_ids).push_back(job_id.to_string());
        self
    }

    /// Make the next submission fail
    pub fn with_submit_error(self, error: VendorError) -> Self {
        lock(&self.submit_errors).push_back(error);
        self
    }

    pub fn set_status(&self, job_id: &str, snapshot: StatusSnapshot) {
        lock(&self.statuses).insert(JobId::new(job_id), MockStatus::Snapshot(snapshot));
    }

    /// Every status call for this job fails until replaced
    pub fn set_status_error(&self, job_id: &str, message: &str) {
        lock(&self.statuses).insert(JobId::new(job_id), MockStatus::Error(message.to_string()));
    }

    pub fn submit_calls(&self) -> Vec<(String, VideoDuration)> {
        lock(&self.submit_calls).clone()
    }

    pub fn status_calls(&self) -> Vec<JobId> {
        lock(&self.status_calls).clone()
    }

    /// Slow down every status call
    pub fn set_status_delay(&self, delay: Duration) {
        *lock(&self.status_delay) = Some(delay);
    }

    /// Most status calls that were ever in flight together
    pub fn max_concurrent_status_calls(&self) -> usize {
        self.status_peak.load(Ordering::SeqCst)
    }
}

impl Default for MockVideoGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseVideoGenerator for MockVideoGenerator {
    async fn submit(&self, prompt: &str, duration: VideoDuration) -> Result<JobId, VendorError> {
        lock(&self.submit_calls).push((prompt.to_string(), duration));

        if let Some(error) = lock(&self.submit_errors).pop_front() {
            return Err(error);
        }

        let job_id = lock(&self.job_ids).pop_front().unwrap_or_else(|| {
            let n = self.counter.fetch_add(1, Ordering::SeqCst);
            format!("mock-job-{}", n)
        });
        Ok(JobId::new(job_id))
    }

    async fn fetch_status(&self, job_id: &JobId) -> Result<StatusSnapshot, VendorError> {
        lock(&self.status_calls).push(job_id.clone());

        let in_flight = self.status_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.status_peak.fetch_max(in_flight, Ordering::SeqCst);
        let delay = *lock(&self.status_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.status_in_flight.fetch_sub(1, Ordering::SeqCst);

        match lock(&self.statuses).get(job_id).cloned() {
            Some(MockStatus::Snapshot(snapshot)) => Ok(snapshot),
            Some(MockStatus::Error(message)) => Err(VendorError::Transport(message)),
            None => Ok(StatusSnapshot::Running { progress: None }),
        }
    }
}

// =============================================================================
// Mock Record Store
// =============================================================================

pub struct MockRecordStore {
    records: Mutex<HashMap<RecordId, GenerationRecord>>,
    patches: Mutex<Vec<(RecordId, RecordPatch)>>,
    posts: Mutex<Vec<NewScheduledPost>>,
    taken_slots: Mutex<Vec<DateTime<Utc>>>,
    failing_patches: AtomicUsize,
    fail_posts: Mutex<bool>,
    fail_lookups: Mutex<bool>,
    fail_job_id_patches: Mutex<bool>,
    patch_delay: Mutex<Option<Duration>>,
}

impl MockRecordStore {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            patches: Mutex::new(Vec::new()),
            posts: Mutex::new(Vec::new()),
            taken_slots: Mutex::new(Vec::new()),
            failing_patches: AtomicUsize::new(0),
            fail_posts: Mutex::new(false),
            fail_lookups: Mutex::new(false),
            fail_job_id_patches: Mutex::new(false),
            patch_delay: Mutex::new(None),
        }
    }

    pub fn with_record(self, record: GenerationRecord) -> Self {
        self.insert(record);
        self
    }

    pub fn insert(&self, record: GenerationRecord) {
        lock(&self.records).insert(record.id, record);
    }

    /// Make the next `count` patches fail
    pub fn fail_next_patches(&self, count: usize) {
        self.failing_patches.store(count, Ordering::SeqCst);
    }

    pub fn fail_post_creation(&self, fail: bool) {
        *lock(&self.fail_posts) = fail;
    }

    pub fn fail_lookups(&self, fail: bool) {
        *lock(&self.fail_lookups) = fail;
    }

    /// Fail every patch that stores a job id
    pub fn fail_job_id_patches(&self, fail: bool) {
        *lock(&self.fail_job_id_patches) = fail;
    }

    /// Slow down every patch, to widen race windows
    pub fn set_patch_delay(&self, delay: Duration) {
        *lock(&self.patch_delay) = Some(delay);
    }

    pub fn take_slot(&self, at: DateTime<Utc>) {
        lock(&self.taken_slots).push(at);
    }

    pub fn record(&self, record_id: RecordId) -> Option<GenerationRecord> {
        lock(&self.records).get(&record_id).cloned()
    }

    pub fn patches(&self) -> Vec<(RecordId, RecordPatch)> {
        lock(&self.patches).clone()
    }

    /// Patches that moved the record into a terminal state
    pub fn terminal_patches(&self, record_id: RecordId) -> Vec<RecordPatch> {
        lock(&self.patches)
            .iter()
            .filter(|(id, patch)| {
                *id == record_id && patch.state.map(|s| s.is_terminal()).unwrap_or(false)
            })
            .map(|(_, patch)| patch.clone())
            .collect()
    }

    pub fn posts(&self) -> Vec<NewScheduledPost> {
        lock(&self.posts).clone()
    }

    fn lookup_error(&self) -> Option<RecordStoreError> {
        lock(&self.fail_lookups)
            .then(|| RecordStoreError::Transport("mock lookup failure".to_string()))
    }
}

impl Default for MockRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseRecordStore for MockRecordStore {
    async fn list_generation_records(&self) -> Result<Vec<GenerationRecord>, RecordStoreError> {
        if let Some(error) = self.lookup_error() {
            return Err(error);
        }
        let mut records: Vec<GenerationRecord> = lock(&self.records).values().cloned().collect();
        records.sort_by_key(|record| record.id);
        Ok(records)
    }

    async fn find_by_job_id(
        &self,
        job_id: &JobId,
    ) -> Result<Option<GenerationRecord>, RecordStoreError> {
        if let Some(error) = self.lookup_error() {
            return Err(error);
        }
        Ok(lock(&self.records)
            .values()
            .find(|record| record.job_id.as_ref() == Some(job_id))
            .cloned())
    }

    async fn find_by_state(
        &self,
        state: RecordState,
    ) -> Result<Vec<GenerationRecord>, RecordStoreError> {
        let mut records = self.list_generation_records().await?;
        records.retain(|record| record.state == state);
        Ok(records)
    }

    async fn patch(
        &self,
        record_id: RecordId,
        patch: &RecordPatch,
    ) -> Result<(), RecordStoreError> {
        let delay = *lock(&self.patch_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failing = self
            .failing_patches
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() || (patch.job_id.is_some() && *lock(&self.fail_job_id_patches)) {
            return Err(RecordStoreError::Api {
                status: 503,
                message: "mock patch failure".to_string(),
            });
        }

        let mut records = lock(&self.records);
        let record = records.get_mut(&record_id).ok_or_else(|| RecordStoreError::Api {
            status: 404,
            message: format!("record {} not found", record_id),
        })?;

        if let Some(state) = patch.state {
            record.state = state;
        }
        if let Some(job_id) = &patch.job_id {
            record.job_id = Some(job_id.clone());
        }
        if let Some(at) = patch.submitted_at {
            record.submitted_at = Some(at);
        }
        if patch.clear_ready_flag {
            record.ready_to_generate = false;
        }

        lock(&self.patches).push((record_id, patch.clone()));
        Ok(())
    }

    async fn scheduled_post_slots(&self) -> Result<Vec<DateTime<Utc>>, RecordStoreError> {
        let mut slots = lock(&self.taken_slots).clone();
        slots.extend(
            lock(&self.posts)
                .iter()
                .map(|post| post.schedule_for.with_timezone(&Utc)),
        );
        Ok(slots)
    }

    async fn create_scheduled_post(
        &self,
        post: &NewScheduledPost,
    ) -> Result<RecordId, RecordStoreError> {
        if *lock(&self.fail_posts) {
            return Err(RecordStoreError::Api {
                status: 500,
                message: "mock post queue failure".to_string(),
            });
        }
        let mut posts = lock(&self.posts);
        posts.push(post.clone());
        Ok(1000 + posts.len() as RecordId)
    }
}

// =============================================================================
// Mock Notifier
// =============================================================================

/// A message captured by [`MockNotifier`]
#[derive(Debug, Clone, PartialEq)]
pub struct SentNotification {
    pub text: String,
    pub audience: Option<String>,
}

pub struct MockNotifier {
    sent: Mutex<Vec<SentNotification>>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn sent(&self) -> Vec<SentNotification> {
        lock(&self.sent).clone()
    }

    /// Messages whose text contains `needle`
    pub fn sent_containing(&self, needle: &str) -> Vec<SentNotification> {
        lock(&self.sent)
            .iter()
            .filter(|message| message.text.contains(needle))
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        lock(&self.sent).clear();
    }
}

impl Default for MockNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseNotifier for MockNotifier {
    async fn notify(&self, text: &str, audience: Option<&str>) {
        lock(&self.sent).push(SentNotification {
            text: text.to_string(),
            audience: audience.map(str::to_string),
        });
    }
}

// =============================================================================
// Mock Caption Writer
// =============================================================================

pub struct MockCaptionWriter {
    caption: Option<String>,
    delay: Option<Duration>,
    calls: Mutex<Vec<String>>,
}

impl MockCaptionWriter {
    pub fn new(caption: &str) -> Self {
        Self {
            caption: Some(caption.to_string()),
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Takes `delay` to answer
    pub fn slow(caption: &str, delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new(caption)
        }
    }

    /// Every call fails
    pub fn failing() -> Self {
        Self {
            caption: None,
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }
}

#[async_trait]
impl BaseCaptionWriter for MockCaptionWriter {
    async fn write_caption(&self, prompt: &str) -> Result<String> {
        lock(&self.calls).push(prompt.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.caption
            .clone()
            .ok_or_else(|| anyhow!("mock caption failure"))
    }
}

// =============================================================================
// TestDependencies
// =============================================================================

/// Mocks plus a [`ServerDeps`] wired to them
pub struct TestDependencies {
    pub vendor: Arc<MockVideoGenerator>,
    pub records: Arc<MockRecordStore>,
    pub notifier: Arc<MockNotifier>,
    pub captions: Arc<MockCaptionWriter>,
    pub stale_after: Duration,
}

impl TestDependencies {
    pub fn new() -> Self {
        Self {
            vendor: Arc::new(MockVideoGenerator::new()),
            records: Arc::new(MockRecordStore::new()),
            notifier: Arc::new(MockNotifier::new()),
            captions: Arc::new(MockCaptionWriter::new("Wait for it 🛹\n#Cats #Skate #Viral")),
            stale_after: Duration::from_secs(3600),
        }
    }

    pub fn mock_vendor(mut self, vendor: MockVideoGenerator) -> Self {
        self.vendor = Arc::new(vendor);
        self
    }

    pub fn mock_records(mut self, records: MockRecordStore) -> Self {
        self.records = Arc::new(records);
        self
    }

    pub fn mock_captions(mut self, captions: MockCaptionWriter) -> Self {
        self.captions = Arc::new(captions);
        self
    }

    pub fn stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    /// Build a fresh ServerDeps (with an empty registry) over the mocks
    pub fn server_deps(&self) -> ServerDeps {
        ServerDeps::new(
            self.vendor.clone(),
            self.records.clone(),
            self.notifier.clone(),
            self.captions.clone(),
            self.stale_after,
        )
    }
}

impl Default for TestDependencies {
    fn default() -> Self {
        Self::new()
    }
}
