use anyhow::{bail, Context, Result};
use dotenvy::dotenv;
use std::env;
use std::time::Duration;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub webhook_path: String,
    pub geminigen_api_key: String,
    pub gemini_api_key: Option<String>,
    pub baserow_url: String,
    pub baserow_username: String,
    pub baserow_password: String,
    pub telegram_bot_token: String,
    /// Default notification audience
    pub telegram_chat_ids: Vec<String>,
    pub sweep_interval: Duration,
    pub stale_after: Duration,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let telegram_chat_ids = parse_chat_ids(
            &env::var("TELEGRAM_CHAT_IDS").context("TELEGRAM_CHAT_IDS must be set")?,
        );
        if telegram_chat_ids.is_empty() {
            bail!("TELEGRAM_CHAT_IDS must list at least one chat id");
        }

        let mut webhook_path =
            env::var("WEBHOOK_PATH").unwrap_or_else(|_| "/sora-callback".to_string());
        if !webhook_path.starts_with('/') {
            webhook_path.insert(0, '/');
        }

        Ok(Self {
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            webhook_path,
            geminigen_api_key: env::var("GEMINIGEN_API_KEY")
                .or_else(|_| env::var("SORA_API_KEY"))
                .context("GEMINIGEN_API_KEY (or SORA_API_KEY) must be set")?,
            gemini_api_key: env::var("GEMINI_API_KEY").ok().filter(|key| !key.is_empty()),
            baserow_url: env::var("BASEROW_URL").context("BASEROW_URL must be set")?,
            baserow_username: env::var("BASEROW_USERNAME")
                .context("BASEROW_USERNAME must be set")?,
            baserow_password: env::var("BASEROW_PASSWORD")
                .context("BASEROW_PASSWORD must be set")?,
            telegram_bot_token: env::var("TELEGRAM_BOT_TOKEN")
                .context("TELEGRAM_BOT_TOKEN must be set")?,
            telegram_chat_ids,
            sweep_interval: secs_var("SWEEP_INTERVAL_SECS", 1800)?,
            stale_after: secs_var("STALE_AFTER_SECS", 3600)?,
        })
    }
}

fn secs_var(name: &str, default: u64) -> Result<Duration> {
    let secs = match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .with_context(|| format!("{} must be a whole number of seconds", name))?,
        Err(_) => default,
    };
    if secs == 0 {
        bail!("{} must be greater than zero", name);
    }
    Ok(Duration::from_secs(secs))
}

/// Comma-separated chat ids, blanks dropped.
pub fn parse_chat_ids(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}
