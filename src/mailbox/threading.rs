//! Grouping messages into conversations.
//!
//! Two messages share a conversation when they are linked, directly or
//! through intermediate IDs, by `In-Reply-To` or `References`. Referenced
//! IDs that are not in the mailbox still link the messages that cite them.
//! Subjects are never used for grouping.

use std::collections::HashMap;

use crate::model::message::{Conversation, Message, ThreadId};
use crate::parser::header::{extract_all_ids, normalize_id};

/// Union-find over string IDs.
#[derive(Default)]
struct Links {
    index: HashMap<String, usize>,
    parent: Vec<usize>,
}

impl Links {
    fn slot(&mut self, id: &str) -> usize {
        if let Some(&i) = self.index.get(id) {
            return i;
        }
        let i = self.parent.len();
        self.parent.push(i);
        self.index.insert(id.to_string(), i);
        i
    }

    fn find(&mut self, mut i: usize) -> usize {
        while self.parent[i] != i {
            self.parent[i] = self.parent[self.parent[i]];
            i = self.parent[i];
        }
        i
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent[rb] = ra;
        }
    }
}

/// Build conversations from messages in mailbox order.
///
/// Messages inside a conversation are sorted oldest first (file order breaks
/// ties). A conversation's ID is the ID of its oldest message. Conversations
/// are returned newest first.
pub fn build_conversations(messages: Vec<Message>) -> Vec<Conversation> {
    let mut links = Links::default();
    let mut slots = Vec::with_capacity(messages.len());

    for message in &messages {
        let own = links.slot(message.id.as_str());
        let mut related = extract_all_ids(message.header("References"));
        let in_reply_to = normalize_id(message.header("In-Reply-To"));
        if !in_reply_to.is_empty() {
            related.push(in_reply_to);
        }
        for id in related {
            if id != message.id.as_str() {
                let other = links.slot(&id);
                links.union(own, other);
            }
        }
        slots.push(own);
    }

    let mut groups: HashMap<usize, Vec<(usize, Message)>> = HashMap::new();
    for (position, (message, slot)) in messages.into_iter().zip(slots).enumerate() {
        let root = links.find(slot);
        groups.entry(root).or_default().push((position, message));
    }

    let mut conversations: Vec<(usize, Conversation)> = groups
        .into_values()
        .filter_map(|mut members| {
            members.sort_by(|(pa, a), (pb, b)| a.date.cmp(&b.date).then(pa.cmp(pb)));
            let first_position = members.iter().map(|(p, _)| *p).min()?;
            let messages: Vec<Message> = members.into_iter().map(|(_, m)| m).collect();
            let id = ThreadId::new(messages.first()?.id.as_str());
            Some((first_position, Conversation { id, messages }))
        })
        .collect();

    conversations.sort_by(|(pa, a), (pb, b)| b.newest().cmp(&a.newest()).then(pa.cmp(pb)));
    conversations.into_iter().map(|(_, c)| c).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::message::MessageId;
    use chrono::{Duration, TimeZone, Utc};

    fn msg(id: &str, minutes: i64, headers: &[(&str, &str)]) -> Message {
        Message {
            id: MessageId::new(id),
            subject: format!("subject {id}"),
            from: String::new(),
            to: String::new(),
            cc: String::new(),
            date: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minutes),
            plain_body: String::new(),
            unread: true,
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn test_reply_chain_groups_together() {
        let convs = build_conversations(vec![
            msg("a@x", 0, &[]),
            msg("b@x", 10, &[("In-Reply-To", "<a@x>")]),
            msg("c@x", 20, &[("References", "<a@x> <b@x>")]),
            msg("z@x", 5, &[]),
        ]);
        assert_eq!(convs.len(), 2);
        assert_eq!(convs[0].id.as_str(), "a@x");
        let ids: Vec<&str> = convs[0].messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["a@x", "b@x", "c@x"]);
        assert_eq!(convs[1].id.as_str(), "z@x");
    }

    #[test]
    fn test_missing_parent_still_links_siblings() {
        let convs = build_conversations(vec![
            msg("b@x", 10, &[("In-Reply-To", "<gone@x>")]),
            msg("c@x", 20, &[("References", "<gone@x>")]),
        ]);
        assert_eq!(convs.len(), 1);
        assert_eq!(convs[0].id.as_str(), "b@x");
    }

    #[test]
    fn test_cycles_terminate() {
        let convs = build_conversations(vec![
            msg("a@x", 0, &[("In-Reply-To", "<b@x>")]),
            msg("b@x", 1, &[("In-Reply-To", "<a@x>")]),
            msg("c@x", 2, &[("References", "<c@x>")]),
        ]);
        assert_eq!(convs.len(), 2);
    }

    #[test]
    fn test_same_subject_is_not_merged() {
        let mut a = msg("a@x", 0, &[]);
        let mut b = msg("b@x", 1, &[]);
        a.subject = "Re: same".into();
        b.subject = "Re: same".into();
        assert_eq!(build_conversations(vec![a, b]).len(), 2);
    }

    #[test]
    fn test_empty_input() {
        assert!(build_conversations(Vec::new()).is_empty());
    }
}
