//! Search query parser and matcher shared by the mailbox backends.
//!
//! # Supported syntax
//!
//! **Field-specific**:
//! - `from:alice@example.com`, `to:desk@example.com`, `cc:boss@example.com`
//! - `subject:invoice`, `subject:(Re: OR 返信:)` (any of the alternatives)
//! - `deliveredto:desk@example.com` (To, Cc, `Delivered-To`, `X-Original-To`)
//! - `label:返信追跡`
//!
//! **State and age**:
//! - `is:unread` / `is:read`
//! - `newer_than:1d` / `older_than:2h` (units `h`, `d`, `m` = 30 days, `y`)
//!
//! **Operators**:
//! - `term1 term2`: implicit AND
//! - `term1 OR term2`: explicit OR between top-level text terms
//! - `-term`: NOT
//! - `"exact phrase"`: quoted phrase
//!
//! Plain words search subject, from, and to. Matching is case-insensitive
//! substring containment. A field with an empty value is ignored.

use chrono::{DateTime, Duration, Utc};

use crate::model::message::{Conversation, Message};

/// Which field to search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchField {
    /// Subject + from + to.
    All,
    From,
    To,
    Cc,
    Subject,
    DeliveredTo,
    Label,
}

/// A single text term. Matches when any of `values` is contained in the field.
#[derive(Debug, Clone)]
pub struct SearchTerm {
    pub field: SearchField,
    /// Lowercased alternatives.
    pub values: Vec<String>,
    pub negated: bool,
}

/// Message age filter relative to "now".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgeFilter {
    NewerThan(Duration),
    OlderThan(Duration),
}

/// A fully parsed search query.
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub terms: Vec<SearchTerm>,
    /// `Some(true)` for `is:unread`, `Some(false)` for `is:read`.
    pub unread: Option<bool>,
    pub age_filters: Vec<AgeFilter>,
    /// Whether text terms are OR-ed instead of AND-ed.
    pub is_or: bool,
}

/// Parse a query string into a structured [`SearchQuery`].
///
/// Never fails: unrecognized syntax is treated as plain text.
pub fn parse_query(input: &str) -> SearchQuery {
    let mut query = SearchQuery::default();
    let tokens = tokenize(input.trim());
    query.is_or = tokens.iter().any(|t| t == "OR");

    for token in &tokens {
        if token == "OR" {
            continue;
        }

        let (negated, token) = match token.strip_prefix('-') {
            Some(stripped) if !stripped.is_empty() => (true, stripped),
            _ => (false, token.as_str()),
        };

        if let Some(value) = token.strip_prefix("is:") {
            match value.to_lowercase().as_str() {
                "unread" => query.unread = Some(!negated),
                "read" => query.unread = Some(negated),
                _ => {}
            }
            continue;
        }
        if let Some(value) = token.strip_prefix("newer_than:") {
            if let Some(age) = parse_age(value) {
                query.age_filters.push(if negated {
                    AgeFilter::OlderThan(age)
                } else {
                    AgeFilter::NewerThan(age)
                });
            }
            continue;
        }
        if let Some(value) = token.strip_prefix("older_than:") {
            if let Some(age) = parse_age(value) {
                query.age_filters.push(if negated {
                    AgeFilter::NewerThan(age)
                } else {
                    AgeFilter::OlderThan(age)
                });
            }
            continue;
        }

        let (field, value) = split_field(token);
        let values = parse_values(value);
        if values.is_empty() {
            continue;
        }
        query.terms.push(SearchTerm {
            field,
            values,
            negated,
        });
    }

    query
}

/// Split `field:value`; unknown prefixes are plain text.
fn split_field(token: &str) -> (SearchField, &str) {
    let fields = [
        ("from:", SearchField::From),
        ("to:", SearchField::To),
        ("cc:", SearchField::Cc),
        ("subject:", SearchField::Subject),
        ("deliveredto:", SearchField::DeliveredTo),
        ("label:", SearchField::Label),
    ];
    for (prefix, field) in fields {
        if let Some(value) = token.strip_prefix(prefix) {
            return (field, value);
        }
    }
    (SearchField::All, token)
}

/// Lowercased alternatives of a value: `(a OR b)` groups, quotes removed.
fn parse_values(value: &str) -> Vec<String> {
    let inner = value
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'));
    let raw: Vec<String> = match inner {
        Some(group) => tokenize(group)
            .into_iter()
            .filter(|t| t != "OR")
            .collect(),
        None => vec![value.to_string()],
    };
    raw.iter()
        .map(|v| unquote(v).to_lowercase())
        .filter(|v| !v.is_empty())
        .collect()
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(value)
}

/// `1d`, `12h`, `2m` (months of 30 days), `1y`.
fn parse_age(value: &str) -> Option<Duration> {
    let value = value.trim();
    let unit = value.chars().last()?;
    let amount: i64 = value[..value.len() - unit.len_utf8()].parse().ok()?;
    match unit.to_ascii_lowercase() {
        'h' => Duration::try_hours(amount),
        'd' => Duration::try_days(amount),
        'm' => Duration::try_days(amount.checked_mul(30)?),
        'y' => Duration::try_days(amount.checked_mul(365)?),
        _ => None,
    }
}

/// Split on whitespace, keeping quoted strings and parenthesized groups whole.
fn tokenize(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut depth = 0usize;

    for ch in input.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                current.push(ch);
            }
            '(' if !in_quotes => {
                depth += 1;
                current.push(ch);
            }
            ')' if !in_quotes => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            c if c.is_whitespace() && !in_quotes && depth == 0 => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

impl SearchQuery {
    /// Whether a single message matches. `labels` are the labels of the
    /// conversation the message belongs to.
    pub fn matches_message(&self, message: &Message, labels: &[String], now: DateTime<Utc>) -> bool {
        if let Some(want_unread) = self.unread {
            if message.unread != want_unread {
                return false;
            }
        }

        for filter in &self.age_filters {
            let ok = match *filter {
                AgeFilter::NewerThan(age) => message.date >= now - age,
                AgeFilter::OlderThan(age) => message.date < now - age,
            };
            if !ok {
                return false;
            }
        }

        if self.terms.is_empty() {
            return true;
        }
        if self.is_or {
            self.terms.iter().any(|t| term_matches(message, labels, t))
        } else {
            self.terms.iter().all(|t| term_matches(message, labels, t))
        }
    }

    /// A conversation matches when any of its messages does.
    pub fn matches_conversation(
        &self,
        conversation: &Conversation,
        labels: &[String],
        now: DateTime<Utc>,
    ) -> bool {
        conversation
            .messages
            .iter()
            .any(|m| self.matches_message(m, labels, now))
    }
}

fn term_matches(message: &Message, labels: &[String], term: &SearchTerm) -> bool {
    let any_in = |haystacks: &[&str]| {
        haystacks.iter().any(|h| {
            let lower = h.to_lowercase();
            term.values.iter().any(|v| lower.contains(v.as_str()))
        })
    };

    let raw_match = match term.field {
        SearchField::All => any_in(&[&message.subject, &message.from, &message.to]),
        SearchField::From => any_in(&[&message.from]),
        SearchField::To => any_in(&[&message.to]),
        SearchField::Cc => any_in(&[&message.cc]),
        SearchField::Subject => any_in(&[&message.subject]),
        SearchField::DeliveredTo => any_in(&[
            &message.to,
            &message.cc,
            message.header("Delivered-To"),
            message.header("X-Original-To"),
        ]),
        SearchField::Label => {
            let names: Vec<&str> = labels.iter().map(String::as_str).collect();
            any_in(&names)
        }
    };

    raw_match != term.negated
}

/// Filter, then cut one page out of the matching conversations.
pub fn select_page<'a, I, F>(
    conversations: I,
    query: &SearchQuery,
    labels_of: F,
    now: DateTime<Utc>,
    offset: usize,
    page_size: usize,
) -> Vec<Conversation>
where
    I: IntoIterator<Item = &'a Conversation>,
    F: Fn(&Conversation) -> Vec<String>,
{
    conversations
        .into_iter()
        .filter(|c| query.matches_conversation(c, &labels_of(c), now))
        .skip(offset)
        .take(page_size)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::message::MessageId;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap()
    }

    fn message(subject: &str, to: &str, unread: bool, hours_ago: i64) -> Message {
        Message {
            id: MessageId::new("m"),
            subject: subject.into(),
            from: "Client <client@example.com>".into(),
            to: to.into(),
            cc: String::new(),
            date: now() - Duration::hours(hours_ago),
            plain_body: String::new(),
            unread,
            headers: vec![("Delivered-To".into(), "alias@example.com".into())],
        }
    }

    #[test]
    fn test_parse_reply_rule_query() {
        let q = parse_query(
            "is:unread subject:(Re: OR 返信:) newer_than:1d deliveredto:desk@example.com",
        );
        assert_eq!(q.unread, Some(true));
        assert!(!q.is_or);
        assert_eq!(q.age_filters, vec![AgeFilter::NewerThan(Duration::days(1))]);
        assert_eq!(q.terms.len(), 2);
        assert_eq!(q.terms[0].field, SearchField::Subject);
        assert_eq!(q.terms[0].values, vec!["re:".to_string(), "返信:".to_string()]);
        assert_eq!(q.terms[1].field, SearchField::DeliveredTo);
    }

    #[test]
    fn test_empty_field_value_is_ignored() {
        let q = parse_query("is:unread deliveredto:");
        assert!(q.terms.is_empty());
    }

    #[test]
    fn test_parse_age_units() {
        assert_eq!(parse_age("12h"), Some(Duration::hours(12)));
        assert_eq!(parse_age("2m"), Some(Duration::days(60)));
        assert_eq!(parse_age("1y"), Some(Duration::days(365)));
        assert_eq!(parse_age("d"), None);
        assert_eq!(parse_age("5w"), None);
    }

    #[test]
    fn test_tokenize_keeps_groups_and_quotes() {
        assert_eq!(
            tokenize("subject:(a OR b) \"x y\" -from:z"),
            vec!["subject:(a OR b)", "\"x y\"", "-from:z"]
        );
    }

    #[test]
    fn test_matches_unread_reply_to_target() {
        let q = parse_query("is:unread subject:(Re: OR 返信:) newer_than:1d deliveredto:desk@");
        assert!(q.matches_message(&message("Re: quote", "desk@example.com", true, 2), &[], now()));
        assert!(q.matches_message(&message("返信: 見積", "desk@example.com", true, 2), &[], now()));
        assert!(!q.matches_message(&message("Re: quote", "desk@example.com", false, 2), &[], now()));
        assert!(!q.matches_message(&message("Re: quote", "desk@example.com", true, 30), &[], now()));
        assert!(!q.matches_message(&message("Hello", "desk@example.com", true, 2), &[], now()));
        assert!(!q.matches_message(&message("Re: quote", "other@example.com", true, 2), &[], now()));
    }

    #[test]
    fn test_deliveredto_checks_delivery_headers() {
        let q = parse_query("deliveredto:alias@example.com");
        assert!(q.matches_message(&message("x", "someone@else", true, 1), &[], now()));
    }

    #[test]
    fn test_negation_and_labels() {
        let q = parse_query("-label:done");
        let msg = message("x", "a@b", true, 1);
        assert!(q.matches_message(&msg, &[], now()));
        assert!(!q.matches_message(&msg, &["done".to_string()], now()));
    }

    #[test]
    fn test_or_query() {
        let q = parse_query("subject:alpha OR subject:beta");
        assert!(q.is_or);
        assert!(q.matches_message(&message("beta", "a@b", true, 1), &[], now()));
        assert!(!q.matches_message(&message("gamma", "a@b", true, 1), &[], now()));
    }

    #[test]
    fn test_is_read_and_negated_unread() {
        assert_eq!(parse_query("is:read").unread, Some(false));
        assert_eq!(parse_query("-is:unread").unread, Some(false));
    }
}
