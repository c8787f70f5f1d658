pub mod markdown;
pub mod posting_slots;

pub use markdown::*;
pub use posting_slots::*;
