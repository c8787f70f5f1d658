//! Baserow-backed system of record.
//!
//! Maps Baserow rows (user field names) to [`GenerationRecord`]s and
//! [`RecordPatch`]es to single PATCH calls. Field shapes vary with the column
//! type, so parsing accepts both plain values and `{ "id", "value" }` objects.

use std::sync::Arc;

use async_trait::async_trait;
use baserow::{BaserowClient, Filter, Row};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Map, Value};

use crate::domains::generation::error::RecordStoreError;
use crate::domains::generation::models::{
    GenerationRecord, JobId, NewScheduledPost, RecordId, RecordPatch, RecordState, VideoDuration,
};
use crate::kernel::BaseRecordStore;

const PAGE_SIZE: u32 = 200;

/// Table ids and single-select option ids of the reels workspace.
#[derive(Debug, Clone)]
pub struct BaserowSchema {
    pub generation_table: u64,
    pub post_queue_table: u64,
    pub pages_table: u64,
    pub status_draft: u64,
    pub status_processing: u64,
    pub status_completed: u64,
    pub status_error: u64,
    pub post_status_scheduled: u64,
}

impl Default for BaserowSchema {
    fn default() -> Self {
        Self {
            generation_table: 748,
            post_queue_table: 749,
            pages_table: 747,
            status_draft: 3054,
            status_processing: 3055,
            status_completed: 3056,
            status_error: 3057,
            post_status_scheduled: 3060,
        }
    }
}

impl BaserowSchema {
    pub fn status_option(&self, state: RecordState) -> u64 {
        match state {
            RecordState::Draft => self.status_draft,
            RecordState::Processing => self.status_processing,
            RecordState::Completed => self.status_completed,
            RecordState::Error => self.status_error,
        }
    }
}

pub struct BaserowRecordStore {
    client: Arc<BaserowClient>,
    schema: BaserowSchema,
}

impl BaserowRecordStore {
    pub fn new(client: Arc<BaserowClient>) -> Self {
        Self::with_schema(client, BaserowSchema::default())
    }

    pub fn with_schema(client: Arc<BaserowClient>, schema: BaserowSchema) -> Self {
        Self { client, schema }
    }

    /// Fill in the page name when the link row came back without a label.
    async fn with_page_name(&self, mut record: GenerationRecord) -> GenerationRecord {
        let Some(page_id) = record.target_id else {
            return record;
        };
        if record.target_label.is_some() {
            return record;
        }

        match self.client.get_row(self.schema.pages_table, page_id).await {
            Ok(row) => record.target_label = text_field(&row, "Page Name"),
            Err(e) => tracing::warn!(page_id, error = %e, "Could not look up page name"),
        }
        record
    }

    /// Build the PATCH body. Uploads the video first when there is one.
    async fn patch_fields(&self, record_id: RecordId, patch: &RecordPatch) -> Map<String, Value> {
        let mut fields = Map::new();

        if let Some(state) = patch.state {
            fields.insert("Status".into(), json!(self.schema.status_option(state)));
        }
        if let Some(job_id) = &patch.job_id {
            fields.insert("Generation UUID".into(), json!(job_id.as_str()));
        }
        if let Some(at) = patch.submitted_at {
            fields.insert(
                "Submitted At".into(),
                json!(at.to_rfc3339_opts(SecondsFormat::Secs, true)),
            );
        }
        if patch.clear_ready_flag {
            fields.insert("Ready To Generate".into(), json!(false));
        }
        if let Some(video_url) = &patch.video_url {
            // The status change must still land if the upload fails.
            match self.client.upload_file_via_url(video_url).await {
                Ok(file) => {
                    fields.insert("Video".into(), json!([{ "name": file.name }]));
                }
                Err(e) => tracing::warn!(
                    record_id,
                    error = %e,
                    "Video upload failed, saving status without file"
                ),
            }
        }

        fields
    }
}

#[async_trait]
impl BaseRecordStore for BaserowRecordStore {
    async fn list_generation_records(&self) -> Result<Vec<GenerationRecord>, RecordStoreError> {
        let rows = self
            .client
            .list_rows(self.schema.generation_table, &[], PAGE_SIZE)
            .await?;
        Ok(rows.iter().filter_map(parse_generation_row).collect())
    }

    async fn find_by_job_id(
        &self,
        job_id: &JobId,
    ) -> Result<Option<GenerationRecord>, RecordStoreError> {
        let page = self
            .client
            .list_rows_page(
                self.schema.generation_table,
                &[Filter::equal("Generation UUID", job_id.as_str())],
                1,
                1,
            )
            .await?;

        match page.results.first().and_then(parse_generation_row) {
            Some(record) => Ok(Some(self.with_page_name(record).await)),
            None => Ok(None),
        }
    }

    async fn find_by_state(
        &self,
        state: RecordState,
    ) -> Result<Vec<GenerationRecord>, RecordStoreError> {
        let rows = self
            .client
            .list_rows(
                self.schema.generation_table,
                &[Filter::single_select_equal(
                    "Status",
                    self.schema.status_option(state),
                )],
                PAGE_SIZE,
            )
            .await?;

        Ok(rows
            .iter()
            .filter_map(parse_generation_row)
            // The filter is by option id; double-check the label.
            .filter(|record| record.state == state)
            .collect())
    }

    async fn patch(
        &self,
        record_id: RecordId,
        patch: &RecordPatch,
    ) -> Result<(), RecordStoreError> {
        let fields = self.patch_fields(record_id, patch).await;
        if fields.is_empty() {
            return Ok(());
        }

        self.client
            .patch_row(self.schema.generation_table, record_id, &Value::Object(fields))
            .await?;

        tracing::info!(
            record_id,
            state = patch.state.map(|s| s.as_str()),
            "Updated generation record"
        );
        Ok(())
    }

    async fn scheduled_post_slots(&self) -> Result<Vec<DateTime<Utc>>, RecordStoreError> {
        let rows = self
            .client
            .list_rows(
                self.schema.post_queue_table,
                &[Filter::single_select_equal(
                    "Status",
                    self.schema.post_status_scheduled,
                )],
                PAGE_SIZE,
            )
            .await?;

        Ok(rows
            .iter()
            .filter_map(|row| text_field(row, "Schedule For"))
            .filter_map(|raw| parse_timestamp(&raw))
            .collect())
    }

    async fn create_scheduled_post(
        &self,
        post: &NewScheduledPost,
    ) -> Result<RecordId, RecordStoreError> {
        let fields = json!({
            "Source Reel": post.source_record_id.to_string(),
            "Page Name": post.target_id.map(|id| vec![id]).unwrap_or_default(),
            "Video URL": post.video_url,
            "Schedule For": post.schedule_for.to_rfc3339(),
            "Status": self.schema.post_status_scheduled,
            "Caption": post.caption,
        });

        let row = self
            .client
            .create_row(self.schema.post_queue_table, &fields)
            .await?;

        let post_id = row.get("id").and_then(Value::as_u64).unwrap_or_default();
        tracing::info!(
            post_id,
            source_record_id = post.source_record_id,
            schedule_for = %post.schedule_for,
            "Created scheduled post"
        );
        Ok(post_id)
    }
}

// =============================================================================
// Row parsing
// =============================================================================

/// Parse a generation row. Rows without an id are skipped.
pub fn parse_generation_row(row: &Row) -> Option<GenerationRecord> {
    let id = row.get("id").and_then(Value::as_u64)?;

    let (target_id, target_label) = match row.get("Target Page") {
        Some(Value::Array(links)) => match links.first() {
            Some(link) => (
                link.get("id").and_then(Value::as_u64),
                link.get("value")
                    .and_then(Value::as_str)
                    .filter(|v| !v.is_empty())
                    .map(str::to_string),
            ),
            None => (None, None),
        },
        _ => (None, None),
    };

    let state = text_field(row, "Status")
        .and_then(|value| RecordState::parse(&value))
        .unwrap_or_default();

    let ready_to_generate = match row.get("Ready To Generate") {
        Some(Value::Bool(flag)) => *flag,
        Some(Value::Object(obj)) => obj.get("value").and_then(Value::as_bool).unwrap_or(false),
        _ => false,
    };

    Some(GenerationRecord {
        id,
        job_id: text_field(row, "Generation UUID").map(JobId::new),
        prompt: text_field(row, "Prompt").unwrap_or_default(),
        target_id,
        target_label,
        state,
        ready_to_generate,
        duration: text_field(row, "Video Length")
            .map(|raw| VideoDuration::parse(&raw))
            .unwrap_or_default(),
        submitted_at: text_field(row, "Submitted At").and_then(|raw| parse_timestamp(&raw)),
    })
}

/// A non-empty string value, either plain or inside a select option.
fn text_field(row: &Row, name: &str) -> Option<String> {
    let value = match row.get(name)? {
        Value::Object(option) => option.get("value")?,
        other => other,
    };

    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => panic!("row must be an object"),
        }
    }

    #[test]
    fn parses_full_row() {
        let record = parse_generation_row(&row(json!({
            "id": 12,
            "Prompt": "a cat skateboarding",
            "Target Page": [{"id": 42, "value": "Cats Daily"}],
            "Video Length": {"id": 1, "value": "15s"},
            "Status": {"id": 3055, "value": "Processing", "color": "blue"},
            "Ready To Generate": true,
            "Generation UUID": "abc123",
            "Submitted At": "2026-03-01T08:00:00Z"
        })))
        .unwrap();

        assert_eq!(record.id, 12);
        assert_eq!(record.job_id, Some(JobId::new("abc123")));
        assert_eq!(record.target_id, Some(42));
        assert_eq!(record.target_label.as_deref(), Some("Cats Daily"));
        assert_eq!(record.state, RecordState::Processing);
        assert_eq!(record.duration, VideoDuration::Fifteen);
        assert!(record.ready_to_generate);
        assert!(record.submitted_at.is_some());
    }

    #[test]
    fn tolerates_sparse_row() {
        let record = parse_generation_row(&row(json!({
            "id": 3,
            "Status": "Draft",
            "Target Page": [],
            "Generation UUID": "",
            "Video Length": "10s"
        })))
        .unwrap();

        assert_eq!(record.job_id, None);
        assert_eq!(record.target_id, None);
        assert_eq!(record.state, RecordState::Draft);
        assert_eq!(record.duration, VideoDuration::Ten);
        assert!(!record.ready_to_generate);
        assert!(record.prompt.is_empty());
    }

    #[test]
    fn row_without_id_is_skipped() {
        assert!(parse_generation_row(&row(json!({"Prompt": "x"}))).is_none());
    }

    #[test]
    fn status_options_match_schema() {
        let schema = BaserowSchema::default();
        assert_eq!(schema.status_option(RecordState::Processing), 3055);
        assert_eq!(schema.status_option(RecordState::Error), 3057);
    }
}
