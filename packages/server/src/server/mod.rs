// HTTP server setup (Axum) and the Telegram command bot
pub mod app;
pub mod routes;
pub mod telegram_bot;

pub use app::*;
