//! The mailbox collaborator: search, read flags, and labels.
//!
//! The pipeline only talks to [`Mailbox`]. Two backends ship with the crate:
//! [`mbox::MboxMailbox`] over a local MBOX file, and
//! [`memory::MemoryMailbox`] for tests and embedding.

pub mod mbox;
pub mod memory;
pub mod query;
pub mod threading;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::message::{Conversation, MessageId, ThreadId};

/// A user label that can be attached to conversations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl Label {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color: None,
        }
    }
}

/// Everything the pipeline needs from a mailbox.
///
/// All calls are blocking and may fail; the rule engine decides how far a
/// failure propagates.
pub trait Mailbox {
    /// One page of conversations matching `query`, newest first.
    fn search(&mut self, query: &str, offset: usize, page_size: usize)
        -> Result<Vec<Conversation>>;

    fn mark_read(&mut self, id: &MessageId) -> Result<()>;

    fn label_by_name(&self, name: &str) -> Result<Option<Label>>;

    fn create_label(&mut self, name: &str, color: Option<&str>) -> Result<Label>;

    /// Attach a label to a conversation. Attaching twice is harmless.
    fn add_label(&mut self, thread: &ThreadId, label: &Label) -> Result<()>;

    /// Persist read marks and labels changed since the last commit.
    fn commit(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Look a label up by name, creating it if it does not exist yet.
pub fn ensure_label<M: Mailbox + ?Sized>(
    mailbox: &mut M,
    name: &str,
    color: Option<&str>,
) -> Result<Label> {
    match mailbox.label_by_name(name)? {
        Some(label) => Ok(label),
        None => mailbox.create_label(name, color),
    }
}
