use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::common::truncate_chars;
use crate::kernel::BaseCaptionWriter;

/// Used whenever Gemini is unavailable or returns nothing usable.
pub const FALLBACK_CAPTION: &str = "Check this out! 🔥\n#Viral #Trending #ForYou";

const GEMINI_MODEL: &str = "gemini-2.5-flash";
const MAX_PROMPT_CHARS: usize = 500;

const SYSTEM_PROMPT: &str = "You are a viral social media caption expert. Generate short, engaging captions for video posts.

Rules:
1. Keep it under 150 characters (not including hashtags)
2. Use 1-2 emojis maximum
3. Include 3-5 relevant hashtags at the end
4. Make it catchy and scroll-stopping
5. Don't explain the video, create intrigue
6. Use conversational, Gen-Z friendly language
7. NO quotation marks around the caption

Format:
[Caption text with emoji]
#Hashtag1 #Hashtag2 #Hashtag3";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Content,
}

/// Gemini caption writer
/// Without an API key every caption is the fallback.
pub struct GeminiCaptionWriter {
    client: Client,
    api_key: Option<String>,
}

impl GeminiCaptionWriter {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.filter(|key| !key.is_empty()),
        }
    }

    async fn generate(&self, api_key: &str, prompt: &str) -> Result<String> {
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
            GEMINI_MODEL
        );

        let user_message = format!(
            "Generate a viral caption for this video:\n\n{}",
            prompt.chars().take(MAX_PROMPT_CHARS).collect::<String>()
        );

        let request = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: format!("{}\n\n{}", SYSTEM_PROMPT, user_message),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.9,
                max_output_tokens: 200,
            },
        };

        let response = self
            .client
            .post(&url)
            .query(&[("key", api_key)])
            .json(&request)
            .timeout(Duration::from_secs(30))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("Gemini API error {}: {}", status, body);
        }

        let body: GenerateContentResponse = response.json().await?;
        let text = body
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content.parts.into_iter().next())
            .map(|part| clean_caption(&part.text))
            .filter(|caption| !caption.is_empty())
            .ok_or_else(|| anyhow!("Gemini returned no caption"))?;

        Ok(text)
    }
}

#[async_trait]
impl BaseCaptionWriter for GeminiCaptionWriter {
    async fn write_caption(&self, prompt: &str) -> Result<String> {
        let Some(api_key) = self.api_key.as_deref() else {
            tracing::warn!("GEMINI_API_KEY not configured, using fallback caption");
            return Ok(FALLBACK_CAPTION.to_string());
        };

        match self.generate(api_key, prompt).await {
            Ok(caption) => {
                tracing::info!(caption = %truncate_chars(&caption, 50), "Generated caption");
                Ok(caption)
            }
            Err(e) => {
                tracing::error!(error = %e, "Gemini caption failed, using fallback");
                Ok(FALLBACK_CAPTION.to_string())
            }
        }
    }
}

fn clean_caption(raw: &str) -> String {
    raw.trim()
        .trim_matches('"')
        .trim_matches('\'')
        .trim()
        .to_string()
}
