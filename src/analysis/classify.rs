//! Keyword classification of replies.
//!
//! Phrase lists are data; only the priority order and the fallback to
//! [`ReplyType::Normal`] are behavior.

use std::sync::LazyLock;

use regex::Regex;

use crate::model::record::ReplyType;

static ACKNOWLEDGMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("ありがとうございます|承知|了解|確認しました|助かります").expect("valid regex")
});

static FOLLOWUP_QUESTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("質問|疑問|わからない|教えて|詳細お願いします|もう少し").expect("valid regex")
});

static URGENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("急ぎ|至急|緊急|すぐ|本日中|大至急").expect("valid regex"));

/// Domain terms reported in the keyword column, in output order.
pub const KEYWORD_DICTIONARY: &[&str] = &[
    "見積",
    "価格",
    "料金",
    "費用",
    "納期",
    "スケジュール",
    "期限",
    "締切",
    "仕様",
    "要件",
    "機能",
    "原稿",
    "写真",
    "入稿",
    "契約",
    "合意",
    "条件",
    "請求",
    "支払い",
    "問題",
    "トラブル",
    "エラー",
    "不具合",
    "緊急",
    "重要",
    "至急",
    "確認",
    "修正",
    "差し替え",
];

/// Categorize a reply. Acknowledgment beats follow-up question, which beats
/// urgent; anything else is normal.
pub fn reply_type(subject: &str, body: &str) -> ReplyType {
    let text = format!("{subject}\n{body}");
    if ACKNOWLEDGMENT.is_match(&text) {
        ReplyType::Acknowledgment
    } else if FOLLOWUP_QUESTION.is_match(&text) {
        ReplyType::FollowupQuestion
    } else if URGENT.is_match(&text) {
        ReplyType::Urgent
    } else {
        ReplyType::Normal
    }
}

/// Dictionary terms found anywhere in subject or body, in dictionary order.
pub fn keywords(subject: &str, body: &str) -> Vec<&'static str> {
    let text = format!("{subject} {body}");
    KEYWORD_DICTIONARY
        .iter()
        .copied()
        .filter(|term| text.contains(term))
        .collect()
}
