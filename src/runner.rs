//! One complete pass: prepare the sheet, run the rules, write the batch,
//! commit the mailbox, persist the processed ids.

use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;
use tracing::info;

use crate::dedup::DedupStore;
use crate::engine::{RuleEngine, RuleOutcome, ScanSettings};
use crate::error::Result;
use crate::mailbox::Mailbox;
use crate::model::rule::Rule;
use crate::store::sheet::{flush, prepare_header};
use crate::store::{PropertyStore, SheetStore};

/// Collaborators and settings for a run.
pub struct RunContext<'a> {
    pub mailbox: &'a mut dyn Mailbox,
    pub sheet: &'a mut dyn SheetStore,
    pub properties: &'a mut dyn PropertyStore,
    /// Rules with placeholders already filled in.
    pub rules: &'a [Rule],
    pub settings: &'a ScanSettings,
    /// Property key of the processed-id list.
    pub dedup_key: &'a str,
    pub dedup_cap: usize,
    pub timezone: FixedOffset,
    /// Stamped on every record as its processing time.
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub outcomes: Vec<RuleOutcome>,
    pub appended: usize,
    /// Processed ids persisted at the end of the run.
    pub dedup_size: usize,
}

impl RunReport {
    pub fn failed_rules(&self) -> usize {
        self.outcomes.iter().filter(|o| o.error.is_some()).count()
    }
}

pub fn run_once(ctx: RunContext<'_>) -> Result<RunReport> {
    run_once_with(ctx, &mut |_| {})
}

/// Like [`run_once`], calling `on_rule` after each rule finishes.
///
/// Rule failures are contained in their [`RuleOutcome`]; sheet and property
/// failures abort the run.
pub fn run_once_with(
    ctx: RunContext<'_>,
    on_rule: &mut dyn FnMut(&RuleOutcome),
) -> Result<RunReport> {
    let RunContext {
        mailbox,
        sheet,
        properties,
        rules,
        settings,
        dedup_key,
        dedup_cap,
        timezone,
        now,
    } = ctx;

    prepare_header(sheet)?;

    let mut dedup = DedupStore::load(properties.get(dedup_key)?.as_deref());
    let mut batch = Vec::new();

    let mut engine = RuleEngine::new(&mut *mailbox, settings, now);
    let mut outcomes = Vec::with_capacity(rules.len());
    for rule in rules {
        let outcome = engine.run_rule(rule, &mut dedup, &mut batch);
        on_rule(&outcome);
        outcomes.push(outcome);
    }

    let appended = flush(sheet, &batch, &timezone)?;
    mailbox.commit()?;

    properties.set(dedup_key, &dedup.serialize(dedup_cap))?;
    let dedup_size = dedup.retained(dedup_cap).count();

    info!(
        rules = outcomes.len(),
        appended,
        dedup_size,
        "Run finished"
    );
    Ok(RunReport {
        outcomes,
        appended,
        dedup_size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailbox::memory::MemoryMailbox;
    use crate::model::message::{Message, MessageId};
    use crate::model::rule::{Priority, RuleAction};
    use crate::presenter::HEADERS;
    use crate::store::{MemoryProperties, Workbook};

    fn reply(id: &str) -> Message {
        Message {
            id: MessageId::new(id),
            subject: "Re: hello".into(),
            from: "a@x".into(),
            to: "desk@x".into(),
            cc: String::new(),
            date: DateTime::<Utc>::UNIX_EPOCH,
            plain_body: "body".into(),
            unread: true,
            headers: Vec::new(),
        }
    }

    fn rules() -> Vec<Rule> {
        vec![Rule {
            name: "r".into(),
            query: String::new(),
            priority: Priority::Low,
            action: RuleAction::TrackReply,
            label_color: None,
        }]
    }

    #[test]
    fn test_run_writes_header_rows_and_state() {
        let mut mailbox = MemoryMailbox::from_messages(vec![reply("a"), reply("b")]);
        let mut sheet = Workbook::in_memory("s");
        let mut props = MemoryProperties::new();
        let rules = rules();
        let settings = ScanSettings::default();

        let report = run_once(RunContext {
            mailbox: &mut mailbox,
            sheet: &mut sheet,
            properties: &mut props,
            rules: &rules,
            settings: &settings,
            dedup_key: "processedMessageIds",
            dedup_cap: 5000,
            timezone: FixedOffset::east_opt(0).unwrap(),
            now: DateTime::<Utc>::UNIX_EPOCH,
        })
        .unwrap();

        assert_eq!(report.appended, 2);
        assert_eq!(report.dedup_size, 2);
        assert_eq!(report.failed_rules(), 0);
        assert_eq!(sheet.last_row(), 3);
        assert_eq!(sheet.cell(1, 1), Some(HEADERS[0]));
        let stored = props.get("processedMessageIds").unwrap().unwrap();
        let ids: Vec<String> = serde_json::from_str(&stored).unwrap();
        assert_eq!(ids.len(), 2);
    }

    #[test]
    fn test_run_with_nothing_new_still_persists_state() {
        let mut mailbox = MemoryMailbox::new();
        let mut sheet = Workbook::in_memory("s");
        let mut props = MemoryProperties::new();
        let settings = ScanSettings::default();
        let mut seen = 0;

        let report = run_once_with(
            RunContext {
                mailbox: &mut mailbox,
                sheet: &mut sheet,
                properties: &mut props,
                rules: &rules(),
                settings: &settings,
                dedup_key: "k",
                dedup_cap: 5000,
                timezone: FixedOffset::east_opt(0).unwrap(),
                now: Utc::now(),
            },
            &mut |_| seen += 1,
        )
        .unwrap();

        assert_eq!(seen, 1);
        assert_eq!(report.appended, 0);
        assert_eq!(sheet.last_row(), 1);
        assert_eq!(props.get("k").unwrap().as_deref(), Some("[]"));
    }
}
