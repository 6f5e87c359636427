//! Rule evaluation: paged search, reply filtering, record building, and
//! rule actions.
//!
//! Each rule is its own failure domain. An error anywhere inside a rule stops
//! that rule, is logged, and the next rule runs. Records gathered before the
//! failure stay in the batch.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info};

use crate::analysis::{is_reply, keywords, reply_count, reply_type, snippet, trim_reply_junk};
use crate::dedup::DedupStore;
use crate::error::Result;
use crate::mailbox::{ensure_label, Mailbox};
use crate::model::message::{Conversation, Message};
use crate::model::record::ProcessedRecord;
use crate::model::rule::{Rule, RuleAction};
use crate::presenter::{color_for, ReplyCountThresholds};

/// Paging, snippet, and labeling knobs for a run.
#[derive(Debug, Clone)]
pub struct ScanSettings {
    pub page_size: usize,
    pub max_pages: usize,
    pub snippet_length: usize,
    pub thresholds: ReplyCountThresholds,
    pub base_label: String,
    pub frequent_label: String,
    /// Reply count at which the frequent label is added as well.
    pub frequent_threshold: usize,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            page_size: 100,
            max_pages: 20,
            snippet_length: 500,
            thresholds: ReplyCountThresholds::default(),
            base_label: "返信追跡".to_string(),
            frequent_label: "頻繁な返信".to_string(),
            frequent_threshold: 3,
        }
    }
}

/// A record waiting to be written, with its reply-count highlight.
#[derive(Debug, Clone)]
pub struct PendingRecord {
    pub record: ProcessedRecord,
    pub color: Option<&'static str>,
}

/// What one rule did during a run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RuleOutcome {
    pub rule: String,
    pub pages: usize,
    pub conversations_scanned: usize,
    pub recorded: usize,
    /// Set when the rule stopped early.
    pub error: Option<String>,
}

pub struct RuleEngine<'a, M: Mailbox + ?Sized> {
    mailbox: &'a mut M,
    settings: &'a ScanSettings,
    processed_at: DateTime<Utc>,
}

impl<'a, M: Mailbox + ?Sized> RuleEngine<'a, M> {
    /// `processed_at` is stamped on every record of the run.
    pub fn new(mailbox: &'a mut M, settings: &'a ScanSettings, processed_at: DateTime<Utc>) -> Self {
        Self {
            mailbox,
            settings,
            processed_at,
        }
    }

    /// Run every rule in order. Never fails; see [`RuleOutcome::error`].
    pub fn run_all(
        &mut self,
        rules: &[Rule],
        dedup: &mut DedupStore,
        batch: &mut Vec<PendingRecord>,
    ) -> Vec<RuleOutcome> {
        rules
            .iter()
            .map(|rule| self.run_rule(rule, dedup, batch))
            .collect()
    }

    pub fn run_rule(
        &mut self,
        rule: &Rule,
        dedup: &mut DedupStore,
        batch: &mut Vec<PendingRecord>,
    ) -> RuleOutcome {
        let mut outcome = RuleOutcome {
            rule: rule.name.clone(),
            ..RuleOutcome::default()
        };

        match self.scan(rule, dedup, batch, &mut outcome) {
            Ok(()) => {
                info!(
                    rule = %rule.name,
                    recorded = outcome.recorded,
                    "{}: scanned {} conversations",
                    rule.name,
                    outcome.conversations_scanned
                );
            }
            Err(e) => {
                error!(rule = %rule.name, error = %e, "Rule failed");
                outcome.error = Some(e.to_string());
            }
        }
        outcome
    }

    fn scan(
        &mut self,
        rule: &Rule,
        dedup: &mut DedupStore,
        batch: &mut Vec<PendingRecord>,
        outcome: &mut RuleOutcome,
    ) -> Result<()> {
        let mut offset = 0;

        while outcome.pages < self.settings.max_pages {
            let page = self
                .mailbox
                .search(&rule.query, offset, self.settings.page_size)?;
            if page.is_empty() {
                break;
            }
            outcome.conversations_scanned += page.len();

            for conversation in &page {
                for message in &conversation.messages {
                    if !message.unread || !is_reply(message) || dedup.contains(message.id.as_str()) {
                        continue;
                    }

                    let record = self.build_record(rule, conversation, message);
                    let color = color_for(record.reply_count, &self.settings.thresholds);
                    let count = record.reply_count;
                    debug!(
                        rule = %rule.name,
                        message = %message.id,
                        reply_count = count,
                        reply_type = %record.reply_type,
                        "Recorded reply"
                    );
                    batch.push(PendingRecord { record, color });
                    outcome.recorded += 1;

                    self.execute_action(rule, conversation, count)?;
                    dedup.insert(message.id.as_str());
                    self.mailbox.mark_read(&message.id)?;
                }
            }

            offset += self.settings.page_size;
            outcome.pages += 1;
        }
        Ok(())
    }

    fn build_record(&self, rule: &Rule, conversation: &Conversation, message: &Message) -> ProcessedRecord {
        let body = snippet(&trim_reply_junk(&message.plain_body), self.settings.snippet_length);
        ProcessedRecord {
            timestamp: message.date,
            from: message.from.clone(),
            to: message.to.clone(),
            cc: message.cc.clone(),
            subject: message.subject.clone(),
            reply_type: reply_type(&message.subject, &body),
            keywords: keywords(&message.subject, &body),
            body,
            rule_name: rule.name.clone(),
            priority: rule.priority,
            reply_count: reply_count(conversation),
            processed_at: self.processed_at,
            message_id: message.id.clone(),
            thread_id: conversation.id.clone(),
        }
    }

    fn execute_action(&mut self, rule: &Rule, conversation: &Conversation, count: usize) -> Result<()> {
        match rule.action {
            RuleAction::TrackReply => {
                let base = ensure_label(
                    &mut *self.mailbox,
                    &self.settings.base_label,
                    rule.label_color.as_deref(),
                )?;
                self.mailbox.add_label(&conversation.id, &base)?;

                if count >= self.settings.frequent_threshold {
                    let frequent = ensure_label(&mut *self.mailbox, &self.settings.frequent_label, None)?;
                    self.mailbox.add_label(&conversation.id, &frequent)?;
                }
            }
            RuleAction::Unsupported => {}
        }
        Ok(())
    }
}
