//! Telegram command bot.
//!
//! Long-polls `getUpdates` and routes commands from the configured chats.
//! Generation requests run on their own task so polling never stalls.

use std::sync::Arc;
use std::time::Duration;

use telegram::{ReplyKeyboard, TelegramBot, Update};

use crate::domains::generation::actions::submit_ready_records;
use crate::domains::generation::messages;
use crate::kernel::ServerDeps;

const POLL_TIMEOUT: Duration = Duration::from_secs(30);
const ERROR_BACKOFF: Duration = Duration::from_secs(5);

const HELP_TEXT: &str = "🎬 *Sora Video Bot*\n\n\
Commands:\n\
• 🎬 Generate - Process ready records\n\
• 📊 Status - Check bot status\n\
• ❓ Help - Show this message\n\n\
Use the buttons below or type commands.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Generate,
    Status,
    Help,
    Unknown,
}

impl Command {
    /// Parse a message. Non-command chatter is `None`.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim().to_lowercase();
        // "/generate@my_bot" in group chats
        let text = text.split('@').next().unwrap_or_default();

        match text {
            "/generate" | "/gen" | "🎬 generate" => Some(Command::Generate),
            "/status" | "📊 status" => Some(Command::Status),
            "/help" | "/start" | "❓ help" => Some(Command::Help),
            other if other.starts_with('/') => Some(Command::Unknown),
            _ => None,
        }
    }
}

fn keyboard() -> ReplyKeyboard {
    ReplyKeyboard::new(&[&["🎬 Generate", "📊 Status"], &["❓ Help"]])
}

pub struct CommandBot {
    bot: Arc<TelegramBot>,
    deps: ServerDeps,
    allowed_chats: Vec<String>,
}

impl CommandBot {
    pub fn new(bot: Arc<TelegramBot>, deps: ServerDeps, allowed_chats: Vec<String>) -> Self {
        Self {
            bot,
            deps,
            allowed_chats,
        }
    }

    /// Poll forever.
    pub async fn run(self) {
        tracing::info!("Starting Telegram command polling");
        let mut offset = 0i64;

        loop {
            match self.bot.get_updates(offset, POLL_TIMEOUT).await {
                Ok(updates) => {
                    for update in updates {
                        offset = offset.max(update.update_id + 1);
                        self.handle_update(update).await;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Telegram polling failed");
                    tokio::time::sleep(ERROR_BACKOFF).await;
                }
            }
        }
    }

    async fn handle_update(&self, update: Update) {
        let Some(message) = update.message else {
            return;
        };
        let Some(command) = message.text.as_deref().and_then(Command::parse) else {
            return;
        };

        let chat_id = message.chat.id.to_string();
        if !self.allowed_chats.contains(&chat_id) {
            tracing::warn!(chat_id = %chat_id, "Ignoring command from unconfigured chat");
            return;
        }

        tracing::info!(chat_id = %chat_id, command = ?command, "Telegram command");

        match command {
            Command::Generate => {
                let deps = self.deps.clone();
                tokio::spawn(async move {
                    if let Err(e) = submit_ready_records(Some(&chat_id), &deps).await {
                        tracing::error!(error = %e, "Generate command failed");
                        deps.notifier
                            .notify(&format!("❌ Error: {}", e), Some(&chat_id))
                            .await;
                    }
                });
            }
            Command::Status => {
                let text = messages::pending_jobs(&self.deps.registry.list_all());
                self.reply(&chat_id, &text).await;
            }
            Command::Help => self.reply(&chat_id, HELP_TEXT).await,
            Command::Unknown => {
                self.reply(&chat_id, "Unknown command. Use /help for available commands.")
                    .await
            }
        }
    }

    async fn reply(&self, chat_id: &str, text: &str) {
        if let Err(e) = self.bot.send_with_keyboard(chat_id, text, keyboard()).await {
            tracing::warn!(chat_id, error = %e, "Failed to send Telegram reply");
        }
    }
}
