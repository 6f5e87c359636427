//! Core data model: messages, conversations, rules, and processed records.

pub mod message;
pub mod record;
pub mod rule;

pub use message::{Conversation, Message, MessageId, ThreadId};
pub use record::{ProcessedRecord, ReplyType};
pub use rule::{Priority, Rule, RuleAction};
