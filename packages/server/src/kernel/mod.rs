//! Kernel module - server infrastructure and dependencies.

pub mod caption;
pub mod deps;
pub mod record_store;
pub mod scheduled_tasks;
pub mod test_dependencies;
pub mod traits;

pub use caption::{GeminiCaptionWriter, FALLBACK_CAPTION};
pub use deps::{GeminiGenAdapter, ServerDeps, TelegramNotifier};
pub use record_store::{BaserowRecordStore, BaserowSchema};
pub use scheduled_tasks::start_scheduler;
pub use test_dependencies::TestDependencies;
pub use traits::*;
