//! The row-shaped output of the pipeline.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::message::{MessageId, ThreadId};
use super::rule::Priority;

/// Semantic category of a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplyType {
    Acknowledgment,
    FollowupQuestion,
    Urgent,
    Normal,
}

impl ReplyType {
    /// Label written to the sheet.
    pub fn label(self) -> &'static str {
        match self {
            Self::Acknowledgment => "確認・承諾",
            Self::FollowupQuestion => "追加質問",
            Self::Urgent => "緊急返信",
            Self::Normal => "通常返信",
        }
    }
}

impl fmt::Display for ReplyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Everything recorded about one newly seen reply. Never mutated after creation.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedRecord {
    pub timestamp: DateTime<Utc>,
    pub from: String,
    pub to: String,
    pub cc: String,
    pub subject: String,
    /// Trimmed and length-capped body.
    pub body: String,
    pub rule_name: String,
    pub priority: Priority,
    pub reply_type: ReplyType,
    pub reply_count: usize,
    pub keywords: Vec<&'static str>,
    pub processed_at: DateTime<Utc>,
    pub message_id: MessageId,
    pub thread_id: ThreadId,
}

impl ProcessedRecord {
    /// Keywords joined the way the sheet shows them.
    pub fn keyword_list(&self) -> String {
        self.keywords.join(", ")
    }
}
