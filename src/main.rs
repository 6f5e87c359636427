//! CLI entry point for `replytrack`.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use clap::{CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use replytrack::config::{self, Config};
use replytrack::mailbox::mbox::MboxMailbox;
use replytrack::presenter::HEADERS;
use replytrack::runner::{run_once_with, RunContext, RunReport};
use replytrack::schedule::{self, Flow, TriggerRegistry};
use replytrack::store::{FileProperties, PropertyStore, SheetStore, Workbook};

#[derive(Parser)]
#[command(
    name = "replytrack",
    version,
    about = "Track replies arriving in a mailbox and record them in a sheet"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (overrides $REPLYTRACK_CONFIG)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// MBOX file to scan (overrides [mailbox] path)
    #[arg(long, global = true, value_name = "FILE")]
    mailbox: Option<PathBuf>,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every rule once
    Run {
        #[arg(long)]
        json: bool,
    },
    /// Run now, then again at every trigger interval
    Watch {
        /// Interval in minutes (defaults to the installed trigger)
        #[arg(long, value_name = "MIN")]
        every: Option<u64>,
    },
    /// Manage the periodic trigger
    Trigger {
        #[command(subcommand)]
        action: TriggerCommand,
    },
    /// Export the sheet as CSV
    Export {
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Show the most recently recorded replies
    Recent {
        #[arg(short = 'n', long, default_value_t = 10)]
        count: usize,
    },
    /// Show mailbox, state and trigger status
    Status {
        #[arg(long)]
        json: bool,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

#[derive(Subcommand)]
enum TriggerCommand {
    /// Register the trigger, replacing any previous one
    Install {
        #[arg(long, value_name = "MIN")]
        every: Option<u64>,
    },
    /// Remove the trigger
    Remove,
    /// List registered triggers
    List,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = config::load_config(cli.config.as_deref());
    if let Some(path) = cli.mailbox {
        config.mailbox.path = Some(path);
    }

    let log_level = match cli.verbose {
        0 => config.general.log_level.clone(),
        1 => "info".to_string(),
        2 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    setup_logging(&log_level, &config);

    match cli.command {
        Commands::Run { json } => cmd_run(&config, json),
        Commands::Watch { every } => cmd_watch(&config, every),
        Commands::Trigger { action } => cmd_trigger(&config, action),
        Commands::Export { output } => cmd_export(&config, &output),
        Commands::Recent { count } => cmd_recent(&config, count),
        Commands::Status { json } => cmd_status(&config, json),
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "replytrack.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

fn open_mailbox(config: &Config) -> anyhow::Result<MboxMailbox> {
    let path = config.mailbox_path()?;
    if !path.exists() {
        anyhow::bail!("Mailbox not found: {}", path.display());
    }
    Ok(MboxMailbox::open(&path, config.mailbox_state_path()?)?)
}

/// One full pass with fresh handles on every store.
fn execute_run(config: &Config, spinner: Option<&ProgressBar>) -> anyhow::Result<RunReport> {
    let mut mailbox = open_mailbox(config)?;
    let mut sheet = Workbook::open(config.workbook_path(), &config.sheet.name)?;
    let mut properties = FileProperties::open(config.properties_path())?;
    let rules = config.resolved_rules();
    let settings = config.scan_settings();

    let report = run_once_with(
        RunContext {
            mailbox: &mut mailbox,
            sheet: &mut sheet,
            properties: &mut properties,
            rules: &rules,
            settings: &settings,
            dedup_key: &config.dedup.key,
            dedup_cap: config.dedup.cap,
            timezone: config.timezone()?,
            now: chrono::Utc::now(),
        },
        &mut |outcome| {
            if let Some(pb) = spinner {
                pb.inc(1);
                pb.set_message(outcome.rule.clone());
            }
        },
    )?;
    Ok(report)
}

fn cmd_run(config: &Config, json: bool) -> anyhow::Result<()> {
    let pb = ProgressBar::new(config.rules.len() as u64);
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} Running rules {pos}/{len} {msg}")
            .expect("valid template"),
    );
    pb.enable_steady_tick(Duration::from_millis(100));

    let start = Instant::now();
    let report = execute_run(config, Some(&pb));
    pb.finish_and_clear();
    let report = report?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report, start.elapsed());
    }
    Ok(())
}

fn print_report(report: &RunReport, elapsed: Duration) {
    println!();
    for outcome in &report.outcomes {
        let status = match &outcome.error {
            Some(e) => format!("failed: {e}"),
            None => "ok".to_string(),
        };
        println!(
            "  {:<30} {:>4} conversations {:>4} recorded  {}",
            truncate_to_width(&outcome.rule, 30),
            outcome.conversations_scanned,
            outcome.recorded,
            status
        );
    }
    println!();
    println!("  {:<25} {}", "Rows appended", report.appended);
    println!("  {:<25} {}", "Processed ids kept", report.dedup_size);
    println!("  {:<25} {:.2?}", "Elapsed", elapsed);
    println!();
}

fn cmd_watch(config: &Config, every: Option<u64>) -> anyhow::Result<()> {
    let registry = TriggerRegistry::open(config.triggers_path())?;
    let interval = every
        .map(|m| Duration::from_secs(m * 60))
        .or_else(|| registry.interval_for(&config.schedule.handler))
        .unwrap_or_else(|| Duration::from_secs(config.schedule.every_minutes * 60));
    if interval.is_zero() {
        anyhow::bail!("Watch interval must be at least one minute");
    }

    println!(
        "  Watching {} every {} min (Ctrl-C to stop)",
        config.mailbox_path()?.display(),
        interval.as_secs() / 60
    );

    schedule::watch(interval, |pass| {
        match execute_run(config, None) {
            Ok(report) => {
                println!(
                    "  [{}] pass {pass}: {} appended, {} failed rule(s)",
                    chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                    report.appended,
                    report.failed_rules()
                );
            }
            Err(e) => {
                tracing::error!(pass, error = %e, "Run failed");
                eprintln!("  pass {pass} failed: {e:#}");
            }
        }
        Ok(Flow::Continue)
    });
    Ok(())
}

fn cmd_trigger(config: &Config, action: TriggerCommand) -> anyhow::Result<()> {
    let mut registry = TriggerRegistry::open(config.triggers_path())?;
    let handler = &config.schedule.handler;
    match action {
        TriggerCommand::Install { every } => {
            let every = every.unwrap_or(config.schedule.every_minutes);
            let trigger = registry.install(handler, every)?;
            println!(
                "  Installed '{}' every {} min",
                trigger.handler, trigger.every_minutes
            );
        }
        TriggerCommand::Remove => {
            let removed = registry.remove(handler)?;
            println!("  Removed {removed} trigger(s) for '{handler}'");
        }
        TriggerCommand::List => {
            if registry.list().is_empty() {
                println!("  No triggers installed");
            }
            for trigger in registry.list() {
                println!(
                    "  {:<25} every {:>4} min  since {}",
                    trigger.handler,
                    trigger.every_minutes,
                    trigger.installed_at.format("%Y-%m-%d %H:%M:%S")
                );
            }
        }
    }
    Ok(())
}

fn cmd_export(config: &Config, output: &Path) -> anyhow::Result<()> {
    let sheet = Workbook::open(config.workbook_path(), &config.sheet.name)?;
    if sheet.last_row() == 0 {
        anyhow::bail!("Sheet '{}' is empty; nothing to export", config.sheet.name);
    }
    let written = replytrack::export::csv::export_csv(sheet.rows(), output)?;
    println!("  Exported {written} row(s) to {}", output.display());
    Ok(())
}

fn cmd_recent(config: &Config, count: usize) -> anyhow::Result<()> {
    let sheet = Workbook::open(config.workbook_path(), &config.sheet.name)?;
    let data: Vec<&Vec<String>> = sheet.rows().iter().skip(1).collect();
    if data.is_empty() {
        println!("  No replies recorded yet");
        return Ok(());
    }

    // 受信日時, 送信者, 件名, 返信タイプ, 返信回数
    let columns: [(usize, usize); 5] = [(0, 19), (1, 28), (4, 40), (8, 10), (9, 4)];
    let header: Vec<String> = columns
        .iter()
        .map(|&(i, w)| pad_to_width(&truncate_to_width(HEADERS[i], w), w))
        .collect();
    println!("  {}", header.join("  "));

    for row in data.iter().skip(data.len().saturating_sub(count)) {
        let cells: Vec<String> = columns
            .iter()
            .map(|&(i, w)| {
                let value = row.get(i).map(String::as_str).unwrap_or("");
                pad_to_width(&truncate_to_width(value, w), w)
            })
            .collect();
        println!("  {}", cells.join("  "));
    }
    Ok(())
}

fn cmd_status(config: &Config, json: bool) -> anyhow::Result<()> {
    use humansize::{format_size, BINARY};

    let mailbox = open_mailbox(config)?;
    let sheet = Workbook::open(config.workbook_path(), &config.sheet.name)?;
    let properties = FileProperties::open(config.properties_path())?;
    let registry = TriggerRegistry::open(config.triggers_path())?;

    let dedup = replytrack::dedup::DedupStore::load(properties.get(&config.dedup.key)?.as_deref());
    let recorded = sheet.last_row().saturating_sub(1);

    if json {
        let value = serde_json::json!({
            "mailbox": mailbox.mbox_path().display().to_string(),
            "mailbox_size": mailbox.file_size(),
            "messages": mailbox.message_count(),
            "conversations": mailbox.conversation_count(),
            "unread": mailbox.unread_count(),
            "processed_ids": dedup.len(),
            "sheet": config.sheet.name,
            "recorded_rows": recorded,
            "triggers": registry.list(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!();
    println!("  {:<25} {}", "Mailbox", mailbox.mbox_path().display());
    println!(
        "  {:<25} {}",
        "Mailbox size",
        format_size(mailbox.file_size(), BINARY)
    );
    println!("  {:<25} {}", "Messages", mailbox.message_count());
    println!("  {:<25} {}", "Conversations", mailbox.conversation_count());
    println!("  {:<25} {}", "Unread", mailbox.unread_count());
    println!("  {:<25} {}", "Processed ids", dedup.len());
    println!("  {:<25} {}", "Sheet", config.sheet.name);
    println!("  {:<25} {}", "Recorded rows", recorded);
    match registry.interval_for(&config.schedule.handler) {
        Some(interval) => println!(
            "  {:<25} every {} min",
            "Trigger",
            interval.as_secs() / 60
        ),
        None => println!("  {:<25} not installed", "Trigger"),
    }
    println!();
    Ok(())
}

/// Truncate a string to a display width, adding "…" when cut.
fn truncate_to_width(s: &str, max_width: usize) -> String {
    if s.width() <= max_width {
        return s.to_string();
    }
    let mut out = String::new();
    let mut width = 0;
    for ch in s.chars() {
        let w = ch.width().unwrap_or(0);
        if width + w + 1 > max_width {
            break;
        }
        out.push(ch);
        width += w;
    }
    out.push('…');
    out
}

/// Right-pad with spaces to a display width.
fn pad_to_width(s: &str, width: usize) -> String {
    let pad = width.saturating_sub(s.width());
    format!("{s}{}", " ".repeat(pad))
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "replytrack", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_to_width_cjk() {
        assert_eq!(truncate_to_width("見積のご相談", 12), "見積のご相談");
        assert_eq!(truncate_to_width("見積のご相談", 7), "見積の…");
        assert_eq!(truncate_to_width("abc", 3), "abc");
    }

    #[test]
    fn test_pad_to_width() {
        assert_eq!(pad_to_width("見積", 6), "見積  ");
        assert_eq!(pad_to_width("abcdef", 3), "abcdef");
    }

    #[test]
    fn test_cli_parses() {
        Cli::command().debug_assert();
        let cli = Cli::try_parse_from(["replytrack", "trigger", "install", "--every", "15"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Trigger {
                action: TriggerCommand::Install { every: Some(15) }
            }
        ));
    }
}
