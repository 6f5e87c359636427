//! In-memory mailbox.
//!
//! Used by the test suites and for embedding the pipeline without a mail
//! file. Individual queries and label writes can be made to fail so error
//! isolation can be exercised.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::{DateTime, Utc};

use super::query::{parse_query, select_page};
use super::threading::build_conversations;
use super::{Label, Mailbox};
use crate::error::{Result, TrackError};
use crate::model::message::{Conversation, Message, MessageId, ThreadId};

#[derive(Debug, Default)]
pub struct MemoryMailbox {
    conversations: Vec<Conversation>,
    labels: Vec<Label>,
    thread_labels: BTreeMap<ThreadId, BTreeSet<String>>,
    read: HashSet<MessageId>,
    failing_queries: Vec<String>,
    fail_add_label: bool,
    now: Option<DateTime<Utc>>,
    search_calls: usize,
}

impl MemoryMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mailbox holding `messages`, grouped into conversations by their
    /// reply headers.
    pub fn from_messages(messages: Vec<Message>) -> Self {
        Self::from_conversations(build_conversations(messages))
    }

    /// A mailbox holding exactly these conversations, in this order.
    pub fn from_conversations(conversations: Vec<Conversation>) -> Self {
        let read = conversations
            .iter()
            .flat_map(|c| c.messages.iter())
            .filter(|m| !m.unread)
            .map(|m| m.id.clone())
            .collect();
        Self {
            conversations,
            read,
            ..Self::default()
        }
    }

    /// Pin the clock used by `newer_than:` / `older_than:`.
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    /// Any search whose query contains `needle` fails.
    pub fn fail_queries_containing(&mut self, needle: impl Into<String>) {
        self.failing_queries.push(needle.into());
    }

    /// Every `add_label` call fails.
    pub fn fail_add_label(&mut self, fail: bool) {
        self.fail_add_label = fail;
    }

    pub fn is_unread(&self, id: &MessageId) -> bool {
        !self.read.contains(id)
    }

    /// Label names attached to a conversation.
    pub fn label_names(&self, thread: &ThreadId) -> Vec<String> {
        self.thread_labels
            .get(thread)
            .map(|names| names.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    /// Number of `search` calls served so far.
    pub fn search_calls(&self) -> usize {
        self.search_calls
    }

    fn snapshot(&self, conversation: &Conversation) -> Conversation {
        let mut conversation = conversation.clone();
        for message in &mut conversation.messages {
            message.unread = !self.read.contains(&message.id);
        }
        conversation
    }
}

impl Mailbox for MemoryMailbox {
    fn search(&mut self, query: &str, offset: usize, page_size: usize) -> Result<Vec<Conversation>> {
        self.search_calls += 1;
        if let Some(needle) = self.failing_queries.iter().find(|n| query.contains(n.as_str())) {
            return Err(TrackError::Search {
                query: query.to_string(),
                reason: format!("simulated failure for '{needle}'"),
            });
        }

        let parsed = parse_query(query);
        let now = self.now.unwrap_or_else(Utc::now);
        let current: Vec<Conversation> = self
            .conversations
            .iter()
            .map(|c| self.snapshot(c))
            .collect();
        Ok(select_page(
            &current,
            &parsed,
            |c| self.label_names(&c.id),
            now,
            offset,
            page_size,
        ))
    }

    fn mark_read(&mut self, id: &MessageId) -> Result<()> {
        let known = self
            .conversations
            .iter()
            .any(|c| c.messages.iter().any(|m| &m.id == id));
        if !known {
            return Err(TrackError::MessageAccess {
                id: id.to_string(),
                reason: "no such message".into(),
            });
        }
        self.read.insert(id.clone());
        Ok(())
    }

    fn label_by_name(&self, name: &str) -> Result<Option<Label>> {
        Ok(self.labels.iter().find(|l| l.name == name).cloned())
    }

    fn create_label(&mut self, name: &str, color: Option<&str>) -> Result<Label> {
        if let Some(existing) = self.labels.iter().find(|l| l.name == name) {
            return Ok(existing.clone());
        }
        let label = Label {
            name: name.to_string(),
            color: color.map(str::to_string),
        };
        self.labels.push(label.clone());
        Ok(label)
    }

    fn add_label(&mut self, thread: &ThreadId, label: &Label) -> Result<()> {
        if self.fail_add_label {
            return Err(TrackError::Label {
                name: label.name.clone(),
                reason: "simulated failure".into(),
            });
        }
        self.thread_labels
            .entry(thread.clone())
            .or_default()
            .insert(label.name.clone());
        Ok(())
    }
}
