use serde::{Deserialize, Serialize};

/// Form fields for a Sora generation request.
#[derive(Debug, Clone, Serialize)]
pub struct SoraRequest {
    pub prompt: String,
    pub model: String,
    pub resolution: String,
    pub duration: u32,
    pub aspect_ratio: String,
}

impl SoraRequest {
    /// Portrait, small-resolution `sora-2` request, which is what reels need.
    pub fn portrait(prompt: impl Into<String>, duration: u32) -> Self {
        Self {
            prompt: prompt.into(),
            model: "sora-2".to_string(),
            resolution: "small".to_string(),
            duration,
            aspect_ratio: "portrait".to_string(),
        }
    }
}

/// Response to a generation request.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitResponse {
    pub uuid: Option<String>,
}

/// Generation status as reported by the history endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationStatus {
    Processing,
    Completed,
    Failed,
}

impl GenerationStatus {
    /// Map the numeric status code (1 = processing, 2 = completed, 3 = failed).
    ///
    /// Unknown codes are treated as still processing.
    pub fn from_code(code: Option<i64>) -> Self {
        match code {
            Some(2) => GenerationStatus::Completed,
            Some(3) => GenerationStatus::Failed,
            _ => GenerationStatus::Processing,
        }
    }
}

/// One rendered video inside a history entry.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeneratedVideo {
    pub video_url: Option<String>,
    pub file_download_url: Option<String>,
}

/// A history entry for one generation uuid.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryEntry {
    pub uuid: Option<String>,
    pub status: Option<i64>,
    pub status_desc: Option<String>,
    pub status_percentage: Option<f64>,
    pub media_url: Option<String>,
    #[serde(default)]
    pub generated_video: Vec<GeneratedVideo>,
    pub error_message: Option<String>,
}

impl HistoryEntry {
    pub fn generation_status(&self) -> GenerationStatus {
        GenerationStatus::from_code(self.status)
    }

    /// The finished video, wherever the API chose to put it.
    ///
    /// Checks `media_url` first, then the first `generated_video` entry.
    pub fn video_url(&self) -> Option<&str> {
        if let Some(url) = self.media_url.as_deref().filter(|u| !u.is_empty()) {
            return Some(url);
        }

        self.generated_video.first().and_then(|video| {
            video
                .video_url
                .as_deref()
                .or(video.file_download_url.as_deref())
                .filter(|u| !u.is_empty())
        })
    }
}
