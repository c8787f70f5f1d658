//! Pure GeminiGen REST API client.
//!
//! A minimal client for the GeminiGen Sora endpoints. Supports starting a
//! video generation and reading its history entry for status polling.
//!
//! # Example
//!
//! ```rust,ignore
//! use geminigen::{GeminiGenClient, SoraRequest};
//!
//! let client = GeminiGenClient::new("your-api-key".into());
//!
//! let uuid = client.generate(&SoraRequest::portrait("a cat skateboarding", 10)).await?;
//! let entry = client.history(&uuid).await?;
//! println!("{:?}", entry.generation_status());
//! ```

pub mod error;
pub mod types;

pub use error::{GeminiGenError, Result};
pub use types::{GeneratedVideo, GenerationStatus, HistoryEntry, SoraRequest, SubmitResponse};

use reqwest::multipart::Form;

const BASE_URL: &str = "https://api.geminigen.ai";

pub struct GeminiGenClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GeminiGenClient {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, BASE_URL)
    }

    pub fn with_base_url(api_key: String, base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Start a Sora generation. Returns the generation uuid immediately.
    pub async fn generate(&self, request: &SoraRequest) -> Result<String> {
        let form = Form::new()
            .text("prompt", request.prompt.clone())
            .text("model", request.model.clone())
            .text("resolution", request.resolution.clone())
            .text("duration", request.duration.to_string())
            .text("aspect_ratio", request.aspect_ratio.clone());

        tracing::info!(
            model = %request.model,
            duration = request.duration,
            "Submitting Sora generation"
        );

        let url = format!("{}/uapi/v1/video-gen/sora", self.base_url);
        let resp = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .multipart(form)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GeminiGenError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let submitted: SubmitResponse = resp.json().await?;
        submitted
            .uuid
            .filter(|uuid| !uuid.is_empty())
            .ok_or(GeminiGenError::MissingUuid)
    }

    /// Fetch the history entry for a generation.
    pub async fn history(&self, uuid: &str) -> Result<HistoryEntry> {
        let url = format!("{}/uapi/v1/history/{}", self.base_url, uuid);
        let resp = self
            .client
            .get(&url)
            .header("x-api-key", &self.api_key)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GeminiGenError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let entry: HistoryEntry = resp.json().await?;
        tracing::debug!(
            uuid,
            status = ?entry.status,
            percentage = ?entry.status_percentage,
            "Fetched generation history"
        );
        Ok(entry)
    }
}
