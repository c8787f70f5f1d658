// Main entry point for the reel generation server

use std::sync::Arc;

use anyhow::{Context, Result};
use baserow::BaserowClient;
use geminigen::GeminiGenClient;
use reels_core::domains::generation::actions::rehydrate;
use reels_core::kernel::{
    start_scheduler, BaserowRecordStore, GeminiCaptionWriter, GeminiGenAdapter, ServerDeps,
    TelegramNotifier,
};
use reels_core::server::{build_app, telegram_bot::CommandBot};
use reels_core::Config;
use telegram::{TelegramBot, TelegramOptions};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,reels_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting reel generation server");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!(
        webhook_path = %config.webhook_path,
        default_chats = config.telegram_chat_ids.len(),
        captions_enabled = config.gemini_api_key.is_some(),
        "Configuration loaded"
    );

    let bot = Arc::new(TelegramBot::new(TelegramOptions {
        bot_token: config.telegram_bot_token.clone(),
    }));

    let deps = ServerDeps::new(
        Arc::new(GeminiGenAdapter::new(Arc::new(GeminiGenClient::new(
            config.geminigen_api_key.clone(),
        )))),
        Arc::new(BaserowRecordStore::new(Arc::new(BaserowClient::new(
            config.baserow_url.clone(),
            config.baserow_username.clone(),
            config.baserow_password.clone(),
        )))),
        Arc::new(TelegramNotifier::new(
            bot.clone(),
            config.telegram_chat_ids.clone(),
        )),
        Arc::new(GeminiCaptionWriter::new(config.gemini_api_key.clone())),
        config.stale_after,
    );

    // Recover jobs that were in flight before the restart
    match rehydrate(&deps).await {
        Ok(report) => tracing::info!(
            recovered = report.recovered,
            structural_failures = report.structural_failures,
            "Recovered pending jobs"
        ),
        // The sweep lists Processing records on its own; keep serving.
        Err(e) => tracing::error!(error = %e, "Rehydration failed"),
    }

    let _scheduler = start_scheduler(deps.clone(), config.sweep_interval)
        .await
        .context("Failed to start scheduler")?;

    tokio::spawn(CommandBot::new(bot, deps.clone(), config.telegram_chat_ids.clone()).run());

    let app = build_app(deps, &config.webhook_path);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting server on {}", addr);
    tracing::info!("Webhook endpoint: http://localhost:{}{}", config.port, config.webhook_path);
    tracing::info!("Health check: http://localhost:{}/health", config.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .await
        .context("Server error")?;

    Ok(())
}
