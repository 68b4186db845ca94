//! `jobtrail stats`: aggregate numbers across the search.

use chrono::{Duration, Utc};
use serde_json::json;
use std::io::stdout;
use std::path::PathBuf;

use crate::db::models::ListOptions;
use crate::error::JobError;
use crate::output::{self, OutputFormat};
use crate::tracker;

pub fn run(
    config_path: &Option<PathBuf>,
    output: OutputFormat,
    since: Option<String>,
    detailed: bool,
    classification: bool,
) -> Result<(), JobError> {
    let config = super::load_config(config_path)?;
    let db = super::open_database(&config)?;

    let since = since
        .map(|s| super::parse_duration_days(&s))
        .transpose()?
        .map(|days| Utc::now() - Duration::days(days));

    let mut stats = db.stats(since)?;

    // Mean response time over conversations that actually had replies.
    let convs = db.list_conversations(&ListOptions {
        since,
        include_archived: true,
        ..Default::default()
    })?;
    let mut total = 0.0;
    let mut counted = 0;
    for conv in &convs {
        let emails = db.list_emails_for_conversation(&conv.id)?;
        let avg = tracker::response_time_days_by_direction(&emails);
        if avg > 0.0 {
            total += avg;
            counted += 1;
        }
    }
    if counted > 0 {
        stats.avg_response_time_days = total / counted as f64;
    }

    if classification {
        let metrics = db.list_metrics(14)?;
        return match output {
            OutputFormat::Json => output::json(&json!({
                "stats": stats,
                "classification_metrics": metrics,
            })),
            OutputFormat::Table => {
                output::stats_table(&mut stdout(), &stats)?;
                println!("\nClassification (last {} days):", metrics.len());
                for m in &metrics {
                    println!(
                        "  {}  processed {:>4}  auto {:>4}  validated {:>4}  excluded {:>4}  false-pos {:>4}",
                        m.day, m.processed, m.auto_included, m.validated, m.excluded, m.false_positives
                    );
                }
                Ok(())
            }
        };
    }

    if detailed {
        return match output {
            OutputFormat::Json => output::json(&json!({ "stats": stats, "conversations": convs })),
            OutputFormat::Table => {
                output::stats_table(&mut stdout(), &stats)?;
                println!();
                output::conversations_table(&mut stdout(), &convs)
            }
        };
    }

    match output {
        OutputFormat::Json => output::json(&stats),
        OutputFormat::Table => output::stats_table(&mut stdout(), &stats),
    }
}
