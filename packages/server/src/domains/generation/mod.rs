//! Job lifecycle coordination for remote video generation.
//!
//! A job is submitted once, then finished exactly once by whichever
//! completion signal (webhook push or sweep poll) reaches the reconciler
//! first. The record store's Processing marker is the durable truth; the
//! registry is rebuilt from it on every start.

pub mod actions;
pub mod error;
pub mod messages;
pub mod models;
pub mod registry;

pub use error::{GenerationError, RecordStoreError, VendorError};
pub use registry::{JobLease, JobRegistry};
