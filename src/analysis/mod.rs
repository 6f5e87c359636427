//! Pure message analysis: reply detection, body trimming, classification.

pub mod classify;
pub mod content;
pub mod reply;

pub use classify::{keywords, reply_type};
pub use content::{snippet, trim_reply_junk};
pub use reply::{is_reply, reply_count};
