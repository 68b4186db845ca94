//! Command-line surface
//!
//! One module per command, mirroring the verbs: sync, list, show,
//! thread, search, stats, merge, archive, mark-spam, export, config,
//! filters, feedback, mcp.

mod archive;
pub mod config_cmd;
pub mod export;
pub mod feedback;
pub mod filters;
mod list;
mod markspam;
mod mcp_cmd;
mod merge;
mod search;
mod show;
mod stats;
mod sync;
mod terminal;
mod thread;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::db::models::Conversation;
use crate::db::Database;
use crate::error::JobError;
use crate::output::OutputFormat;

#[derive(Parser)]
#[command(
    name = "jobtrail",
    version,
    about = "Track recruiter conversations from your mailbox",
    long_about = "jobtrail syncs your inbox and sent folder, filters out alerts and\n\
                  newsletters, groups real recruiter conversations per contact, and\n\
                  tracks whose turn it is to reply."
)]
pub struct Cli {
    /// Config file (default: ~/.config/jobtrail/config.toml)
    #[arg(short, long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Table)]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Fetch and process new emails from the provider
    Sync {
        /// Fetch window, e.g. 60, 2w, 3m (default: since last sync)
        #[arg(long)]
        days: Option<String>,
        /// Ignore the last sync time and fetch the default window
        #[arg(long)]
        full: bool,
        /// Skip LLM classification (faster, filter layers only)
        #[arg(long = "no-classify")]
        no_classify: bool,
        /// Quick sync: defer classification, report the pending count
        #[arg(long)]
        background: bool,
    },
    /// List conversations
    List {
        /// Filter by status (active, waiting_on_me, waiting_on_them, stale, closed)
        #[arg(long)]
        status: Option<String>,
        /// Only conversations with activity in this window (e.g. 30d, 2w)
        #[arg(long)]
        since: Option<String>,
        /// Maximum rows
        #[arg(long)]
        limit: Option<usize>,
        /// Include archived conversations
        #[arg(long = "include-archived")]
        include_archived: bool,
    },
    /// Show one conversation with its timeline
    Show {
        /// Company name or conversation id
        identifier: String,
    },
    /// Show the full email thread, bodies included
    Thread {
        /// Company name or conversation id
        identifier: String,
    },
    /// Search conversations and email subjects
    Search { query: String },
    /// Aggregate statistics
    Stats {
        /// Restrict to this window (e.g. 30d, 2w, 1m)
        #[arg(long)]
        since: Option<String>,
        /// Per-conversation breakdown
        #[arg(long)]
        detailed: bool,
        /// Per-day classification counters
        #[arg(long)]
        classification: bool,
    },
    /// Merge the source conversation into the target
    Merge {
        /// Target (keeps its metadata; receives the emails)
        target: String,
        /// Source (deleted after the merge)
        source: String,
    },
    /// Hide a conversation from default list output
    Archive { identifier: String },
    /// Bring an archived conversation back
    Unarchive { identifier: String },
    /// Report a conversation as not job-related (false positive)
    #[command(name = "mark-spam")]
    MarkSpam { identifier: String },
    /// Export conversations to CSV or JSON
    Export {
        #[arg(long, value_enum, default_value_t = export::ExportFormat::Csv)]
        format: export::ExportFormat,
        #[arg(long = "include-archived")]
        include_archived: bool,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: config_cmd::ConfigAction,
    },
    /// Inspect and curate learned filter rules
    Filters {
        #[command(subcommand)]
        action: filters::FiltersAction,
    },
    /// Correct the filter when it was wrong
    Feedback {
        #[command(subcommand)]
        action: feedback::FeedbackAction,
    },
    /// Serve the MCP stdio interface
    Mcp,
}

/// Parse and run; the process exit code is 0 on `Ok`, 1 otherwise.
pub async fn run(cli: Cli) -> Result<(), JobError> {
    match cli.command {
        Command::Sync {
            days,
            full,
            no_classify,
            background,
        } => sync::run(&cli.config, cli.output, days, full, no_classify, background).await,
        Command::List {
            status,
            since,
            limit,
            include_archived,
        } => list::run(&cli.config, cli.output, status, since, limit, include_archived),
        Command::Show { identifier } => show::run(&cli.config, cli.output, &identifier),
        Command::Thread { identifier } => thread::run(&cli.config, cli.output, &identifier).await,
        Command::Search { query } => search::run(&cli.config, cli.output, &query),
        Command::Stats {
            since,
            detailed,
            classification,
        } => stats::run(&cli.config, cli.output, since, detailed, classification),
        Command::Merge { target, source } => merge::run(&cli.config, cli.output, &target, &source),
        Command::Archive { identifier } => archive::run(&cli.config, cli.output, &identifier, false),
        Command::Unarchive { identifier } => archive::run(&cli.config, cli.output, &identifier, true),
        Command::MarkSpam { identifier } => markspam::run(&cli.config, cli.output, &identifier),
        Command::Export {
            format,
            include_archived,
        } => export::run(&cli.config, format, include_archived),
        Command::Config { action } => config_cmd::run(&cli.config, action),
        Command::Filters { action } => filters::run(&cli.config, cli.output, action),
        Command::Feedback { action } => feedback::run(&cli.config, cli.output, action),
        Command::Mcp => mcp_cmd::run(&cli.config).await,
    }
}

/// Load the config from `--config` or the default location.
pub(crate) fn load_config(path: &Option<PathBuf>) -> Result<Config, JobError> {
    match path {
        Some(p) => Config::load(p),
        None => Config::load(Config::default_path()),
    }
}

pub(crate) fn open_database(config: &Config) -> Result<Database, JobError> {
    Database::open(&config.database.path)
}

pub(crate) fn find_conversation(db: &Database, identifier: &str) -> Result<Conversation, JobError> {
    db.find_conversation(identifier)?
        .ok_or_else(|| JobError::NotFound(format!("conversation: {}", identifier)))
}

/// A cancellation token wired to Ctrl-C.
pub(crate) fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let child = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            child.cancel();
        }
    });
    cancel
}

/// Parse a duration flag into days. Accepts a bare number of days or a
/// number with a `d`/`w`/`m` suffix (months count as 30 days).
pub(crate) fn parse_duration_days(s: &str) -> Result<i64, JobError> {
    let s = s.trim();
    let (number, multiplier) = match s.chars().last() {
        Some('d') | Some('D') => (&s[..s.len() - 1], 1),
        Some('w') | Some('W') => (&s[..s.len() - 1], 7),
        Some('m') | Some('M') => (&s[..s.len() - 1], 30),
        _ => (s, 1),
    };

    let n: i64 = number
        .parse()
        .map_err(|_| JobError::Other(format!("invalid duration: {:?} (use N, Nd, Nw, or Nm)", s)))?;
    if n < 1 {
        return Err(JobError::Other(format!("duration must be positive: {:?}", s)));
    }

    Ok(n * multiplier)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn duration_suffixes() {
        assert_eq!(parse_duration_days("5").unwrap(), 5);
        assert_eq!(parse_duration_days("5d").unwrap(), 5);
        assert_eq!(parse_duration_days("2w").unwrap(), 14);
        assert_eq!(parse_duration_days("3m").unwrap(), 90);
        assert_eq!(parse_duration_days("2W").unwrap(), 14);
        assert!(parse_duration_days("abc").is_err());
        assert!(parse_duration_days("0").is_err());
        assert!(parse_duration_days("-3d").is_err());
    }

    #[test]
    fn parses_sync_flags() {
        let cli = Cli::parse_from(["jobtrail", "sync", "--days", "2w", "--no-classify"]);
        match cli.command {
            Command::Sync {
                days, no_classify, ..
            } => {
                assert_eq!(days.as_deref(), Some("2w"));
                assert!(no_classify);
            }
            _ => panic!("wrong command"),
        }
    }

    #[test]
    fn parses_mark_spam_name() {
        let cli = Cli::parse_from(["jobtrail", "mark-spam", "Acme"]);
        assert!(matches!(cli.command, Command::MarkSpam { .. }));
    }
}
