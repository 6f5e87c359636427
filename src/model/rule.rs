//! Filter rules: what to search for and what to do with matches.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Priority recorded alongside every row a rule produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Side effect executed for each newly recorded message.
///
/// Unrecognized action names deserialize to [`RuleAction::Unsupported`],
/// which does nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleAction {
    /// Label the conversation, plus a second label once it gets busy.
    TrackReply,
    #[serde(other)]
    Unsupported,
}

/// A matching + action policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub name: String,
    /// Search query, possibly containing `{time_range}` / `{target_address}`.
    pub query: String,
    pub priority: Priority,
    pub action: RuleAction,
    /// Display color for labels this rule creates.
    #[serde(default)]
    pub label_color: Option<String>,
}

impl Rule {
    /// Return a copy with query placeholders filled in.
    pub fn resolved(&self, time_range: &str, target_address: &str) -> Self {
        let query = self
            .query
            .replace("{time_range}", time_range)
            .replace("{target_address}", target_address);
        Self {
            query,
            ..self.clone()
        }
    }
}
