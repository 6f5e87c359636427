//! Mailbox backed by a local MBOX file.
//!
//! The MBOX file itself is never rewritten. Read marks and labels live in a
//! JSON sidecar next to it and are layered over the parsed messages on every
//! search. Labels from `X-Gmail-Labels` (Google Takeout exports) are merged
//! with the sidecar labels. Changes reach the sidecar on [`Mailbox::commit`].

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::query::{parse_query, select_page};
use super::threading::build_conversations;
use super::{Label, Mailbox};
use crate::error::{Result, TrackError};
use crate::model::message::{Conversation, MessageId, ThreadId};
use crate::parser::mbox::MboxParser;
use crate::parser::mime::parse_message;

/// Persisted overlay for an MBOX file.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SidecarState {
    /// Message IDs marked read through the mailbox.
    pub read: BTreeSet<String>,
    pub labels: Vec<Label>,
    /// Thread ID to attached label names.
    pub thread_labels: BTreeMap<String, BTreeSet<String>>,
}

pub struct MboxMailbox {
    mbox_path: PathBuf,
    state_path: PathBuf,
    file_size: u64,
    conversations: Vec<Conversation>,
    /// Labels carried in the file, per thread.
    file_labels: BTreeMap<ThreadId, BTreeSet<String>>,
    state: SidecarState,
    dirty: bool,
    now: Option<DateTime<Utc>>,
}

impl MboxMailbox {
    /// Parse `mbox_path` and load the sidecar at `state_path` (missing
    /// sidecar means a fresh state).
    pub fn open(mbox_path: impl AsRef<Path>, state_path: impl AsRef<Path>) -> Result<Self> {
        let parser = MboxParser::new(mbox_path.as_ref())?;
        let mut messages = Vec::new();
        let count = parser.parse(&mut |raw| messages.push(parse_message(raw)))?;
        info!(path = %parser.path().display(), messages = count, "Loaded mailbox");

        let mut gmail_labels: BTreeMap<MessageId, BTreeSet<String>> = BTreeMap::new();
        for message in &messages {
            let names: BTreeSet<String> = message
                .header("X-Gmail-Labels")
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            if !names.is_empty() {
                gmail_labels.insert(message.id.clone(), names);
            }
        }

        let conversations = build_conversations(messages);
        let mut file_labels: BTreeMap<ThreadId, BTreeSet<String>> = BTreeMap::new();
        for conversation in &conversations {
            for message in &conversation.messages {
                if let Some(names) = gmail_labels.get(&message.id) {
                    file_labels
                        .entry(conversation.id.clone())
                        .or_default()
                        .extend(names.iter().cloned());
                }
            }
        }

        let state_path = state_path.as_ref().to_path_buf();
        let state = load_state(&state_path)?;
        debug!(
            conversations = conversations.len(),
            read_marks = state.read.len(),
            "Mailbox state ready"
        );

        Ok(Self {
            mbox_path: parser.path().to_path_buf(),
            state_path,
            file_size: parser.file_size(),
            conversations,
            file_labels,
            state,
            dirty: false,
            now: None,
        })
    }

    /// Pin the clock used by `newer_than:` / `older_than:`.
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    pub fn mbox_path(&self) -> &Path {
        &self.mbox_path
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn conversation_count(&self) -> usize {
        self.conversations.len()
    }

    pub fn message_count(&self) -> usize {
        self.conversations.iter().map(|c| c.messages.len()).sum()
    }

    /// Messages currently unread (file flags plus sidecar read marks).
    pub fn unread_count(&self) -> usize {
        self.conversations
            .iter()
            .flat_map(|c| c.messages.iter())
            .filter(|m| m.unread && !self.state.read.contains(m.id.as_str()))
            .count()
    }

    pub fn labels(&self) -> &[Label] {
        &self.state.labels
    }

    /// File labels and sidecar labels of a conversation.
    pub fn label_names(&self, thread: &ThreadId) -> Vec<String> {
        let mut names: BTreeSet<String> = self
            .file_labels
            .get(thread)
            .cloned()
            .unwrap_or_default();
        if let Some(extra) = self.state.thread_labels.get(thread.as_str()) {
            names.extend(extra.iter().cloned());
        }
        names.into_iter().collect()
    }

    fn save_state(&self) -> Result<()> {
        if let Some(parent) = self.state_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| TrackError::io(parent, e))?;
            }
        }
        let json = serde_json::to_string_pretty(&self.state)
            .map_err(|e| TrackError::json(&self.state_path, e))?;
        std::fs::write(&self.state_path, json).map_err(|e| TrackError::io(&self.state_path, e))
    }
}

fn load_state(path: &Path) -> Result<SidecarState> {
    match std::fs::read_to_string(path) {
        Ok(text) => serde_json::from_str(&text).map_err(|e| TrackError::json(path, e)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(SidecarState::default()),
        Err(e) => Err(TrackError::io(path, e)),
    }
}

impl Mailbox for MboxMailbox {
    fn search(&mut self, query: &str, offset: usize, page_size: usize) -> Result<Vec<Conversation>> {
        let parsed = parse_query(query);
        let now = self.now.unwrap_or_else(Utc::now);
        let current: Vec<Conversation> = self
            .conversations
            .iter()
            .map(|c| {
                let mut c = c.clone();
                for m in &mut c.messages {
                    m.unread = m.unread && !self.state.read.contains(m.id.as_str());
                }
                c
            })
            .collect();
        let page = select_page(
            &current,
            &parsed,
            |c| self.label_names(&c.id),
            now,
            offset,
            page_size,
        );
        debug!(query, offset, found = page.len(), "Search");
        Ok(page)
    }

    fn mark_read(&mut self, id: &MessageId) -> Result<()> {
        let known = self
            .conversations
            .iter()
            .any(|c| c.messages.iter().any(|m| &m.id == id));
        if !known {
            return Err(TrackError::MessageAccess {
                id: id.to_string(),
                reason: "not in mailbox".into(),
            });
        }
        if self.state.read.insert(id.as_str().to_string()) {
            self.dirty = true;
        }
        Ok(())
    }

    fn label_by_name(&self, name: &str) -> Result<Option<Label>> {
        Ok(self.state.labels.iter().find(|l| l.name == name).cloned())
    }

    fn create_label(&mut self, name: &str, color: Option<&str>) -> Result<Label> {
        if let Some(existing) = self.state.labels.iter().find(|l| l.name == name) {
            return Ok(existing.clone());
        }
        let label = Label {
            name: name.to_string(),
            color: color.map(str::to_string),
        };
        self.state.labels.push(label.clone());
        self.dirty = true;
        info!(label = name, "Created label");
        Ok(label)
    }

    fn add_label(&mut self, thread: &ThreadId, label: &Label) -> Result<()> {
        if !self.conversations.iter().any(|c| &c.id == thread) {
            return Err(TrackError::Label {
                name: label.name.clone(),
                reason: format!("unknown conversation {thread}"),
            });
        }
        let added = self
            .state
            .thread_labels
            .entry(thread.as_str().to_string())
            .or_default()
            .insert(label.name.clone());
        if added {
            self.dirty = true;
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        self.save_state()?;
        self.dirty = false;
        debug!(path = %self.state_path.display(), "Saved mailbox state");
        Ok(())
    }
}
