//! Flattening records into sheet rows, and reply-count highlighting.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use crate::model::record::ProcessedRecord;

/// Sheet header, in column order.
pub const HEADERS: [&str; 14] = [
    "受信日時",
    "送信者",
    "宛先",
    "CC",
    "件名",
    "本文（抜粋）",
    "フィルタールール",
    "優先度",
    "返信タイプ",
    "返信回数",
    "キーワード",
    "処理日時",
    "MessageID",
    "ThreadID",
];

/// 1-based column holding the reply count.
pub const REPLY_COUNT_COLUMN: usize = 10;

/// Cell timestamp format.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub const HARD_COLOR: &str = "#FFD700";
pub const MID_COLOR: &str = "#FFFF99";
pub const SOFT_COLOR: &str = "#FFFFCC";

/// Inclusive reply-count thresholds for the three highlight tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplyCountThresholds {
    pub soft: usize,
    pub mid: usize,
    pub hard: usize,
}

impl Default for ReplyCountThresholds {
    fn default() -> Self {
        Self {
            soft: 2,
            mid: 3,
            hard: 5,
        }
    }
}

/// Highlight color for a reply count, checked from the hard tier down.
pub fn color_for(count: usize, thresholds: &ReplyCountThresholds) -> Option<&'static str> {
    if count >= thresholds.hard {
        Some(HARD_COLOR)
    } else if count >= thresholds.mid {
        Some(MID_COLOR)
    } else if count >= thresholds.soft {
        Some(SOFT_COLOR)
    } else {
        None
    }
}

/// One row of cells in [`HEADERS`] order.
pub fn to_row(record: &ProcessedRecord, tz: &FixedOffset) -> Vec<String> {
    vec![
        format_timestamp(&record.timestamp, tz),
        record.from.clone(),
        record.to.clone(),
        record.cc.clone(),
        record.subject.clone(),
        record.body.clone(),
        record.rule_name.clone(),
        record.priority.to_string(),
        record.reply_type.to_string(),
        record.reply_count.to_string(),
        record.keyword_list(),
        format_timestamp(&record.processed_at, tz),
        record.message_id.to_string(),
        record.thread_id.to_string(),
    ]
}

fn format_timestamp(ts: &DateTime<Utc>, tz: &FixedOffset) -> String {
    ts.with_timezone(tz).format(TIMESTAMP_FORMAT).to_string()
}
