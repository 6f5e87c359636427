//! Messages and conversations as seen by the pipeline.
//!
//! These are read-only snapshots handed out by a [`crate::mailbox::Mailbox`].
//! Mutations (mark read, labels) always go back through the mailbox.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable identifier of a single message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a conversation (thread).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ThreadId(pub String);

impl ThreadId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single message snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub subject: String,
    /// Sender as displayed (`Name <addr>` or bare address).
    pub from: String,
    /// Comma-separated primary recipients.
    pub to: String,
    /// Comma-separated carbon-copy recipients.
    pub cc: String,
    pub date: DateTime<Utc>,
    pub plain_body: String,
    pub unread: bool,
    /// Raw header pairs in file order. Names keep their original case.
    #[serde(default)]
    pub headers: Vec<(String, String)>,
}

impl Message {
    /// Value of the first header called `name` (case-insensitive).
    ///
    /// Unknown headers yield an empty string, never an error.
    pub fn header(&self, name: &str) -> &str {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .unwrap_or("")
    }
}

/// An ordered group of messages sharing one reply chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ThreadId,
    /// Oldest first.
    pub messages: Vec<Message>,
}

impl Conversation {
    /// Date of the newest message, used to order search results.
    pub fn newest(&self) -> Option<DateTime<Utc>> {
        self.messages.iter().map(|m| m.date).max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message_with_headers(headers: Vec<(&str, &str)>) -> Message {
        Message {
            id: MessageId::new("m1"),
            subject: String::new(),
            from: String::new(),
            to: String::new(),
            cc: String::new(),
            date: DateTime::UNIX_EPOCH,
            plain_body: String::new(),
            unread: true,
            headers: headers
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let msg = message_with_headers(vec![("In-Reply-To", "<a@b>")]);
        assert_eq!(msg.header("in-reply-to"), "<a@b>");
        assert_eq!(msg.header("IN-REPLY-TO"), "<a@b>");
    }

    #[test]
    fn test_unknown_header_is_empty() {
        let msg = message_with_headers(vec![]);
        assert_eq!(msg.header("References"), "");
        assert_eq!(msg.header("X-Does-Not-Exist"), "");
    }
}
