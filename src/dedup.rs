//! Cross-run record of processed message ids.
//!
//! Ids live in an insertion-ordered set. Nothing is ever removed during a run,
//! so insertion order doubles as recency: eviction on [`DedupStore::serialize`]
//! keeps the tail of the set. Any code that removes or reorders ids breaks
//! that assumption.

use indexmap::IndexSet;
use tracing::warn;

/// Default cap on persisted ids.
pub const DEFAULT_CAP: usize = 5000;

/// Set of already processed message ids.
#[derive(Debug, Clone, Default)]
pub struct DedupStore {
    ids: IndexSet<String>,
}

impl DedupStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a persisted JSON array of ids.
    ///
    /// Missing or malformed input yields an empty store; this never fails.
    /// Duplicate ids collapse, keeping their first position.
    pub fn load(serialized: Option<&str>) -> Self {
        let Some(raw) = serialized else {
            return Self::new();
        };
        if raw.trim().is_empty() {
            return Self::new();
        }
        match serde_json::from_str::<Vec<String>>(raw) {
            Ok(list) => Self {
                ids: list.into_iter().collect(),
            },
            Err(e) => {
                warn!(error = %e, "Discarding unreadable processed-id state");
                Self::new()
            }
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Record an id. Returns `false` if it was already present (its position
    /// is left unchanged).
    pub fn insert(&mut self, id: impl Into<String>) -> bool {
        self.ids.insert(id.into())
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Ids in insertion order, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    /// The ids that survive persistence under `cap`.
    ///
    /// Over the cap, only the newest `cap / 2` are kept.
    pub fn retained(&self, cap: usize) -> impl Iterator<Item = &str> {
        let skip = if self.ids.len() > cap {
            self.ids.len() - cap / 2
        } else {
            0
        };
        self.iter().skip(skip)
    }

    /// JSON array of [`Self::retained`] ids.
    pub fn serialize(&self, cap: usize) -> String {
        let kept: Vec<&str> = self.retained(cap).collect();
        // A list of strings always serializes.
        serde_json::to_string(&kept).unwrap_or_else(|_| "[]".to_string())
    }
}
