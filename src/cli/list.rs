//! `jobtrail list`: conversations, newest activity first.

use chrono::{Duration, Utc};
use std::io::stdout;
use std::path::PathBuf;

use crate::db::models::{ConversationStatus, ListOptions};
use crate::error::JobError;
use crate::output::{self, OutputFormat};

pub fn run(
    config_path: &Option<PathBuf>,
    output: OutputFormat,
    status: Option<String>,
    since: Option<String>,
    limit: Option<usize>,
    include_archived: bool,
) -> Result<(), JobError> {
    let config = super::load_config(config_path)?;
    let db = super::open_database(&config)?;

    let status = status
        .map(|s| match s.as_str() {
            "active" | "waiting_on_me" | "waiting_on_them" | "stale" | "closed" => {
                Ok(ConversationStatus::from_str(&s))
            }
            other => Err(JobError::Other(format!(
                "unknown status {:?} (expected active, waiting_on_me, waiting_on_them, stale, or closed)",
                other
            ))),
        })
        .transpose()?;

    let since = since
        .map(|s| super::parse_duration_days(&s))
        .transpose()?
        .map(|days| Utc::now() - Duration::days(days));

    let opts = ListOptions {
        status,
        since,
        limit: limit.unwrap_or(0),
        include_archived,
        ..Default::default()
    };

    let convs = db.list_conversations(&opts)?;

    match output {
        OutputFormat::Json => output::json(&convs),
        OutputFormat::Table => output::conversations_table(&mut stdout(), &convs),
    }
}
