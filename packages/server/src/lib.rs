// Reel Generation Coordinator - Core
//
// Submits long-running video generations, learns exactly once how each one
// ended (webhook push or sweep poll), and survives restarts by rebuilding its
// in-flight view from the system of record.

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;
pub mod server;

pub use config::*;
