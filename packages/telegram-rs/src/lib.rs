//! Minimal Telegram Bot API client: send messages and long-poll updates.

use std::time::Duration;

pub mod models;
use reqwest::Client;
use thiserror::Error;

pub use crate::models::{ReplyKeyboard, Update};
use crate::models::{ApiResponse, SendMessage};

#[derive(Error, Debug)]
pub enum TelegramError {
    #[error("Telegram returned an error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Request to Telegram failed: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Clone)]
pub struct TelegramOptions {
    pub bot_token: String,
}

#[derive(Debug, Clone)]
pub struct TelegramBot {
    options: TelegramOptions,
    client: Client,
}

impl TelegramBot {
    pub fn new(options: TelegramOptions) -> Self {
        Self {
            options,
            client: Client::new(),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "https://api.telegram.org/bot{token}/{method}",
            token = self.options.bot_token
        )
    }

    /// Send a Markdown message to one chat.
    pub async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), TelegramError> {
        self.post_message(&SendMessage {
            chat_id,
            text,
            parse_mode: Some("Markdown"),
            reply_markup: None,
        })
        .await
    }

    /// Send a Markdown message with a persistent reply keyboard.
    pub async fn send_with_keyboard(
        &self,
        chat_id: &str,
        text: &str,
        keyboard: ReplyKeyboard,
    ) -> Result<(), TelegramError> {
        self.post_message(&SendMessage {
            chat_id,
            text,
            parse_mode: Some("Markdown"),
            reply_markup: Some(keyboard),
        })
        .await
    }

    async fn post_message(&self, message: &SendMessage<'_>) -> Result<(), TelegramError> {
        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .json(message)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(TelegramError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(())
    }

    /// Long-poll for updates after `offset`, waiting up to `timeout` server-side.
    pub async fn get_updates(&self, offset: i64, timeout: Duration) -> Result<Vec<Update>, TelegramError> {
        let response = self
            .client
            .get(self.method_url("getUpdates"))
            .query(&[
                ("offset", offset.to_string()),
                ("timeout", timeout.as_secs().to_string()),
            ])
            .timeout(timeout + Duration::from_secs(10))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(TelegramError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: ApiResponse<Vec<Update>> = response.json().await?;
        if !body.ok {
            return Err(TelegramError::Api {
                status: status.as_u16(),
                message: body.description.unwrap_or_default(),
            });
        }

        Ok(body.result.unwrap_or_default())
    }
}
