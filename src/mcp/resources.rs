//! Read-only resources: plain-text snapshots of the job search.

use serde::Serialize;
use std::fmt::Write as _;

use crate::config::Config;
use crate::db::models::{ConversationStatus, ListOptions};
use crate::db::Database;
use crate::error::JobError;

#[derive(Debug, Clone, Serialize)]
pub struct Resource {
    pub uri: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    #[serde(rename = "mimeType")]
    pub mime_type: &'static str,
}

pub fn definitions() -> Vec<Resource> {
    vec![
        Resource {
            uri: "jobsearch://summary",
            name: "Job Search Summary",
            description: "Current job search status overview with counts by status",
            mime_type: "text/plain",
        },
        Resource {
            uri: "jobsearch://pending",
            name: "Pending Actions",
            description: "Conversations requiring your attention (waiting_on_me and stale)",
            mime_type: "text/plain",
        },
        Resource {
            uri: "jobsearch://recent",
            name: "Recent Activity",
            description: "Last 10 conversations with recent activity",
            mime_type: "text/plain",
        },
        Resource {
            uri: "jobsearch://companies",
            name: "Companies List",
            description: "All companies you're in conversation with",
            mime_type: "text/plain",
        },
    ]
}

/// Render one resource as UTF-8 text.
pub fn read(db: &Database, config: &Config, uri: &str) -> Result<String, JobError> {
    match uri {
        "jobsearch://summary" => summary(db, config),
        "jobsearch://pending" => pending(db),
        "jobsearch://recent" => recent(db),
        "jobsearch://companies" => companies(db),
        _ => Err(JobError::NotFound(format!("resource: {}", uri))),
    }
}

fn summary(db: &Database, config: &Config) -> Result<String, JobError> {
    let stats = db.stats(None)?;
    let mut out = String::new();

    writeln!(out, "Job Search Summary").ok();
    writeln!(out, "==================").ok();
    writeln!(out, "Total conversations: {}", stats.total_conversations).ok();
    writeln!(out, "Waiting on you:      {}", stats.waiting_on_me).ok();
    writeln!(out, "Waiting on them:     {}", stats.waiting_on_them).ok();
    writeln!(
        out,
        "Stale (>{}d):         {}",
        config.tracking.stale_after_days, stats.stale
    )
    .ok();
    writeln!(out, "Closed:              {}", stats.closed).ok();
    writeln!(out, "Emails tracked:      {}", stats.total_emails).ok();
    writeln!(out, "Response rate:       {:.0}%", stats.response_rate * 100.0).ok();

    Ok(out)
}

fn pending(db: &Database) -> Result<String, JobError> {
    let waiting = db.list_conversations(&ListOptions {
        status: Some(ConversationStatus::WaitingOnMe),
        ..Default::default()
    })?;
    let stale = db.list_conversations(&ListOptions {
        status: Some(ConversationStatus::Stale),
        ..Default::default()
    })?;

    let mut out = String::new();
    writeln!(out, "Pending Actions").ok();
    writeln!(out, "===============").ok();

    if waiting.is_empty() && stale.is_empty() {
        writeln!(out, "Nothing needs your attention.").ok();
        return Ok(out);
    }

    if !waiting.is_empty() {
        writeln!(out, "\nWaiting on you:").ok();
        for c in &waiting {
            writeln!(
                out,
                "  - {} ({} emails, last activity {}d ago)",
                c.company,
                c.email_count,
                c.days_since_activity()
            )
            .ok();
        }
    }

    if !stale.is_empty() {
        writeln!(out, "\nGone stale, consider following up:").ok();
        for c in &stale {
            writeln!(
                out,
                "  - {} (last activity {}d ago)",
                c.company,
                c.days_since_activity()
            )
            .ok();
        }
    }

    Ok(out)
}

fn recent(db: &Database) -> Result<String, JobError> {
    let convs = db.list_conversations(&ListOptions {
        limit: 10,
        ..Default::default()
    })?;

    let mut out = String::new();
    writeln!(out, "Recent Activity").ok();
    writeln!(out, "===============").ok();
    for c in &convs {
        writeln!(
            out,
            "  {} [{}] {} emails, last activity {}d ago",
            c.company,
            c.status,
            c.email_count,
            c.days_since_activity()
        )
        .ok();
    }
    if convs.is_empty() {
        writeln!(out, "No conversations yet. Run a sync first.").ok();
    }

    Ok(out)
}

fn companies(db: &Database) -> Result<String, JobError> {
    let convs = db.list_conversations(&ListOptions {
        include_archived: true,
        ..Default::default()
    })?;

    let mut names: Vec<&str> = convs.iter().map(|c| c.company.as_str()).collect();
    names.sort_unstable();
    names.dedup();

    let mut out = String::new();
    writeln!(out, "Companies ({})", names.len()).ok();
    writeln!(out, "=========").ok();
    for name in names {
        writeln!(out, "  {}", name).ok();
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn all_advertised_uris_are_readable() {
        let db = Database::in_memory().unwrap();
        let config = Config::default();

        let conv = db.insert_test_conversation("Acme");
        db.insert_test_email(&conv, "m1", Utc::now());

        for resource in definitions() {
            let text = read(&db, &config, resource.uri).unwrap();
            assert!(!text.is_empty(), "empty resource {}", resource.uri);
        }
    }

    #[test]
    fn companies_are_sorted_and_deduped() {
        let db = Database::in_memory().unwrap();
        db.insert_test_conversation("Globex");
        db.insert_test_conversation("Acme");
        db.insert_test_conversation("Acme");

        let text = companies(&db).unwrap();
        assert!(text.contains("Companies (2)"));
        let acme_pos = text.find("Acme").unwrap();
        let globex_pos = text.find("Globex").unwrap();
        assert!(acme_pos < globex_pos);
    }
}
