//! Reply detection for single messages and whole conversations.

use std::sync::LazyLock;

use regex::Regex;

use crate::model::message::{Conversation, Message};

/// `Re:` (any case) or the Japanese `返信:` at the start of a subject.
static REPLY_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*(re|返信):").expect("valid reply prefix regex"));

/// Whether `subject` starts with a reply marker.
pub fn has_reply_prefix(subject: &str) -> bool {
    REPLY_PREFIX.is_match(subject)
}

/// Whether a message is a reply: a reply-prefixed subject, or a non-empty
/// `In-Reply-To` or `References` header. Whitespace counts as non-empty.
pub fn is_reply(message: &Message) -> bool {
    has_reply_prefix(&message.subject)
        || !message.header("In-Reply-To").is_empty()
        || !message.header("References").is_empty()
}

/// Number of messages in the conversation that are replies.
///
/// Every message is checked on its own; position in the thread is irrelevant.
pub fn reply_count(conversation: &Conversation) -> usize {
    conversation.messages.iter().filter(|m| is_reply(m)).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::message::{MessageId, ThreadId};
    use chrono::DateTime;

    fn msg(id: &str, subject: &str, headers: &[(&str, &str)]) -> Message {
        Message {
            id: MessageId::new(id),
            subject: subject.to_string(),
            from: "a@example.com".into(),
            to: "b@example.com".into(),
            cc: String::new(),
            date: DateTime::UNIX_EPOCH,
            plain_body: String::new(),
            unread: true,
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn test_reply_prefix_variants() {
        assert!(has_reply_prefix("Re: hello"));
        assert!(has_reply_prefix("RE: hello"));
        assert!(has_reply_prefix("re: hello"));
        assert!(has_reply_prefix("  Re: padded"));
        assert!(has_reply_prefix("返信: 見積"));
        assert!(!has_reply_prefix("Fwd: hello"));
        assert!(!has_reply_prefix("About Re: in the middle"));
        assert!(!has_reply_prefix("Report"));
    }

    #[test]
    fn test_is_reply_by_headers() {
        assert!(is_reply(&msg("1", "Hello", &[("In-Reply-To", "<p@x>")])));
        assert!(is_reply(&msg("2", "Hello", &[("References", "<p@x> <q@x>")])));
        assert!(!is_reply(&msg("4", "Hello", &[])));
        assert!(!is_reply(&msg("5", "Hello", &[("In-Reply-To", "")])));
    }

    #[test]
    fn test_whitespace_reference_header_is_a_reply() {
        assert!(is_reply(&msg("3", "Hello", &[("In-Reply-To", " ")])));
        assert!(is_reply(&msg("6", "Hello", &[("References", "\t")])));
    }

    #[test]
    fn test_reply_count_ignores_position() {
        let conversation = Conversation {
            id: ThreadId::new("t"),
            messages: vec![
                msg("1", "Quote request", &[]),
                msg("2", "Re: Quote request", &[]),
                msg("3", "Re: Quote request", &[]),
                msg("4", "Quote request", &[("In-Reply-To", "<3@x>")]),
                msg("5", "Unrelated note", &[]),
            ],
        };
        assert_eq!(reply_count(&conversation), 3);
    }

    #[test]
    fn test_reply_count_empty_conversation() {
        let conversation = Conversation {
            id: ThreadId::new("t"),
            messages: Vec::new(),
        };
        assert_eq!(reply_count(&conversation), 0);
    }
}
