//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. the `--config` path given on the command line
//! 2. `$REPLYTRACK_CONFIG` (environment variable)
//! 3. `~/.config/replytrack/config.toml` (Linux/macOS)
//!    `%APPDATA%\replytrack\config.toml` (Windows)
//! 4. Built-in defaults

use std::path::{Path, PathBuf};

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};

use crate::engine::ScanSettings;
use crate::error::{Result, TrackError};
use crate::model::rule::{Priority, Rule, RuleAction};
use crate::presenter::ReplyCountThresholds;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub mailbox: MailboxConfig,
    pub scan: ScanConfig,
    pub sheet: SheetConfig,
    pub dedup: DedupConfig,
    /// Highlight tiers for the reply-count cell.
    pub reply_count: ReplyCountThresholds,
    pub labels: LabelsConfig,
    pub schedule: ScheduleConfig,
    /// Rules, evaluated in order. An absent list means the built-in rule.
    pub rules: Vec<Rule>,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Fixed UTC offset used to render sheet timestamps, e.g. "+09:00".
    /// Zone names such as "Asia/Tokyo" are not accepted.
    pub timezone: String,
    /// Override for the directory holding the workbook, properties and triggers.
    pub data_dir: Option<PathBuf>,
    /// Override for the log directory.
    pub cache_dir: Option<PathBuf>,
}

/// Which mailbox to scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailboxConfig {
    /// MBOX file to scan.
    pub path: Option<PathBuf>,
    /// Read/label sidecar. Defaults to `<mbox>.state.json`.
    pub state_path: Option<PathBuf>,
    /// Substituted for `{target_address}` in rule queries.
    pub target_address: String,
    /// Substituted for `{time_range}` in rule queries.
    pub time_range: String,
}

/// Search paging and body snippet length.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub page_size: usize,
    pub max_pages: usize,
    pub snippet_length: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetConfig {
    pub name: String,
    /// Defaults to `<data_dir>/workbook.json`.
    pub workbook_path: Option<PathBuf>,
}

/// Processed-id persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Property key holding the id list.
    pub key: String,
    pub cap: usize,
    /// Defaults to `<data_dir>/properties.json`.
    pub properties_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelsConfig {
    pub base: String,
    pub frequent: String,
    pub frequent_threshold: usize,
}

/// Periodic runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Handler name the trigger is registered under.
    pub handler: String,
    pub every_minutes: u64,
    /// Defaults to `<data_dir>/triggers.json`.
    pub triggers_path: Option<PathBuf>,
}

// ── Default implementations ─────────────────────────────────────

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            mailbox: MailboxConfig::default(),
            scan: ScanConfig::default(),
            sheet: SheetConfig::default(),
            dedup: DedupConfig::default(),
            reply_count: ReplyCountThresholds::default(),
            labels: LabelsConfig::default(),
            schedule: ScheduleConfig::default(),
            rules: default_rules(),
        }
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            timezone: "+09:00".to_string(),
            data_dir: None,
            cache_dir: None,
        }
    }
}

impl Default for MailboxConfig {
    fn default() -> Self {
        Self {
            path: None,
            state_path: None,
            target_address: String::new(),
            time_range: "1d".to_string(),
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            page_size: 100,
            max_pages: 20,
            snippet_length: 500,
        }
    }
}

impl Default for SheetConfig {
    fn default() -> Self {
        Self {
            name: "voice仙台メール返信用リスト".to_string(),
            workbook_path: None,
        }
    }
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            key: "processedMessageIds".to_string(),
            cap: crate::dedup::DEFAULT_CAP,
            properties_path: None,
        }
    }
}

impl Default for LabelsConfig {
    fn default() -> Self {
        Self {
            base: "返信追跡".to_string(),
            frequent: "頻繁な返信".to_string(),
            frequent_threshold: 3,
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            handler: "advancedGmailFilter".to_string(),
            every_minutes: 30,
            triggers_path: None,
        }
    }
}

/// The built-in rule: unread replies to the target address.
pub fn default_rules() -> Vec<Rule> {
    vec![Rule {
        name: "二回目以降の返信（Re:付き）".to_string(),
        query: "is:unread subject:(Re: OR 返信:) newer_than:{time_range} deliveredto:{target_address}"
            .to_string(),
        priority: Priority::Medium,
        action: RuleAction::TrackReply,
        label_color: Some("#FFAA00".to_string()),
    }]
}

impl Config {
    /// Rules with `{time_range}` and `{target_address}` filled in.
    pub fn resolved_rules(&self) -> Vec<Rule> {
        self.rules
            .iter()
            .map(|r| r.resolved(&self.mailbox.time_range, &self.mailbox.target_address))
            .collect()
    }

    pub fn scan_settings(&self) -> ScanSettings {
        ScanSettings {
            page_size: self.scan.page_size,
            max_pages: self.scan.max_pages,
            snippet_length: self.scan.snippet_length,
            thresholds: self.reply_count,
            base_label: self.labels.base.clone(),
            frequent_label: self.labels.frequent.clone(),
            frequent_threshold: self.labels.frequent_threshold,
        }
    }

    /// The configured offset. Anything [`parse_offset`] rejects is a
    /// configuration error rather than a silent shift to UTC.
    pub fn timezone(&self) -> Result<FixedOffset> {
        parse_offset(&self.general.timezone).ok_or_else(|| {
            TrackError::Config(format!(
                "timezone {:?} is not a fixed UTC offset such as \"+09:00\"",
                self.general.timezone
            ))
        })
    }

    pub fn mailbox_path(&self) -> Result<PathBuf> {
        self.mailbox.path.clone().ok_or_else(|| {
            TrackError::Config("no mailbox configured; set [mailbox] path or pass --mailbox".into())
        })
    }

    pub fn mailbox_state_path(&self) -> Result<PathBuf> {
        if let Some(ref path) = self.mailbox.state_path {
            return Ok(path.clone());
        }
        let mbox = self.mailbox_path()?;
        let mut name = mbox.file_name().unwrap_or_default().to_os_string();
        name.push(".state.json");
        Ok(mbox.with_file_name(name))
    }

    pub fn workbook_path(&self) -> PathBuf {
        self.sheet
            .workbook_path
            .clone()
            .unwrap_or_else(|| data_dir(self).join("workbook.json"))
    }

    pub fn properties_path(&self) -> PathBuf {
        self.dedup
            .properties_path
            .clone()
            .unwrap_or_else(|| data_dir(self).join("properties.json"))
    }

    pub fn triggers_path(&self) -> PathBuf {
        self.schedule
            .triggers_path
            .clone()
            .unwrap_or_else(|| data_dir(self).join("triggers.json"))
    }
}

/// `+09:00`, `-0530`, `Z`, or `UTC`.
pub fn parse_offset(value: &str) -> Option<FixedOffset> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("utc") || value.eq_ignore_ascii_case("z") {
        return FixedOffset::east_opt(0);
    }
    let (sign, rest) = match value.as_bytes().first()? {
        b'+' => (1, &value[1..]),
        b'-' => (-1, &value[1..]),
        _ => return None,
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if digits.len() != 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let hours: i32 = digits[..2].parse().ok()?;
    let minutes: i32 = digits[2..].parse().ok()?;
    if minutes >= 60 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

// ── Load ────────────────────────────────────────────────────────

/// Load configuration from `explicit` or the standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config(explicit: Option<&Path>) -> Config {
    let path = explicit.map(Path::to_path_buf).or_else(config_file_path);
    if let Some(path) = path {
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<Config>(&contents) {
                    Ok(cfg) => {
                        tracing::info!(path = %path.display(), "Loaded config");
                        return cfg;
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "Failed to parse config, using defaults"
                        );
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to read config file, using defaults"
                    );
                }
            }
        } else if explicit.is_some() {
            tracing::warn!(path = %path.display(), "Config file not found, using defaults");
        }
    }
    Config::default()
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("REPLYTRACK_CONFIG") {
        return Some(PathBuf::from(env_path));
    }
    dirs::config_dir().map(|d| d.join("replytrack").join("config.toml"))
}

/// Directory for the workbook, properties and trigger registry.
pub fn data_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.data_dir {
        return dir.clone();
    }
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("replytrack")
}

/// Directory for logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("replytrack")
}

pub fn log_file_path(config: &Config) -> PathBuf {
    cache_dir(config).join("replytrack.log")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.scan.page_size, 100);
        assert_eq!(cfg.scan.max_pages, 20);
        assert_eq!(cfg.scan.snippet_length, 500);
        assert_eq!(cfg.dedup.key, "processedMessageIds");
        assert_eq!(cfg.dedup.cap, 5000);
        assert_eq!(cfg.reply_count.hard, 5);
        assert_eq!(cfg.schedule.every_minutes, 30);
        assert_eq!(cfg.rules.len(), 1);
        assert_eq!(cfg.rules[0].action, RuleAction::TrackReply);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let partial = r#"
[mailbox]
target_address = "desk@example.com"

[reply_count]
hard = 8
"#;
        let cfg: Config = toml::from_str(partial).expect("parse partial");
        assert_eq!(cfg.mailbox.target_address, "desk@example.com");
        assert_eq!(cfg.mailbox.time_range, "1d");
        assert_eq!(cfg.reply_count.hard, 8);
        assert_eq!(cfg.reply_count.soft, 2);
        assert_eq!(cfg.rules.len(), 1);
    }

    #[test]
    fn test_rules_replace_default() {
        let text = r#"
[[rules]]
name = "urgent"
query = "is:unread subject:至急"
priority = "HIGH"
action = "NOTIFY"
"#;
        let cfg: Config = toml::from_str(text).expect("parse rules");
        assert_eq!(cfg.rules.len(), 1);
        assert_eq!(cfg.rules[0].priority, Priority::High);
        assert_eq!(cfg.rules[0].action, RuleAction::Unsupported);
    }

    #[test]
    fn test_resolved_rules() {
        let mut cfg = Config::default();
        cfg.mailbox.target_address = "desk@example.com".into();
        let rules = cfg.resolved_rules();
        assert_eq!(
            rules[0].query,
            "is:unread subject:(Re: OR 返信:) newer_than:1d deliveredto:desk@example.com"
        );
    }

    #[test]
    fn test_parse_offset() {
        assert_eq!(parse_offset("+09:00"), FixedOffset::east_opt(9 * 3600));
        assert_eq!(parse_offset("-0530"), FixedOffset::east_opt(-(5 * 3600 + 30 * 60)));
        assert_eq!(parse_offset("UTC"), FixedOffset::east_opt(0));
        assert_eq!(parse_offset("Asia/Tokyo"), None);
        assert_eq!(parse_offset("+9"), None);
    }

    #[test]
    fn test_timezone_rejects_zone_names() {
        let mut cfg = Config::default();
        assert_eq!(cfg.timezone().unwrap().local_minus_utc(), 9 * 3600);
        cfg.general.timezone = "Asia/Tokyo".into();
        assert!(matches!(cfg.timezone(), Err(TrackError::Config(_))));
        cfg.general.timezone = "nowhere".into();
        assert!(cfg.timezone().is_err());
    }

    #[test]
    fn test_state_path_next_to_mailbox() {
        let mut cfg = Config::default();
        assert!(cfg.mailbox_state_path().is_err());
        cfg.mailbox.path = Some(PathBuf::from("/mail/inbox.mbox"));
        assert_eq!(
            cfg.mailbox_state_path().unwrap(),
            PathBuf::from("/mail/inbox.mbox.state.json")
        );
    }

    #[test]
    fn test_load_explicit_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config(Some(&dir.path().join("nope.toml")));
        assert_eq!(cfg.scan.page_size, 100);
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[scan]\npage_size = 7\n").unwrap();
        assert_eq!(load_config(Some(&path)).scan.page_size, 7);
    }
}
