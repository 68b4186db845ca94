//! Plain-text tables with computed column widths.

use std::io::Write;

use crate::db::models::{Conversation, ConversationStatus, Email, Stats};
use crate::error::JobError;
use crate::tracker::Thread;

/// Shorten to `max` chars with an ellipsis.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let truncated: String = s.chars().take(max.saturating_sub(1)).collect();
    format!("{truncated}…")
}

fn status_label(status: ConversationStatus) -> &'static str {
    match status {
        ConversationStatus::Active => "active",
        ConversationStatus::WaitingOnMe => "your turn",
        ConversationStatus::WaitingOnThem => "waiting",
        ConversationStatus::Stale => "stale",
        ConversationStatus::Closed => "closed",
    }
}

fn format_last_activity(days: i64) -> String {
    match days {
        0 => "today".to_string(),
        1 => "yesterday".to_string(),
        2..=6 => format!("{days}d ago"),
        7..=29 => format!("{}w ago", days / 7),
        _ => format!("{days}d ago"),
    }
}

/// Render rows with headers, padding each column to its widest cell.
fn render_columns<W: Write>(
    w: &mut W,
    headers: &[&str],
    rows: &[Vec<String>],
) -> Result<(), JobError> {
    fn write_row<W: Write>(w: &mut W, widths: &[usize], cells: &[String]) -> Result<(), JobError> {
        let line = cells
            .iter()
            .enumerate()
            .map(|(i, cell)| format!("{:<width$}", cell, width = widths[i]))
            .collect::<Vec<_>>()
            .join("  ");
        writeln!(w, "{}", line.trim_end())?;
        Ok(())
    }

    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let header_cells: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
    write_row(w, &widths, &header_cells)?;
    let rules: Vec<String> = widths.iter().map(|&n| "-".repeat(n)).collect();
    write_row(w, &widths, &rules)?;
    for row in rows {
        write_row(w, &widths, row)?;
    }
    Ok(())
}

pub fn conversations_table<W: Write>(w: &mut W, convs: &[Conversation]) -> Result<(), JobError> {
    if convs.is_empty() {
        writeln!(w, "No conversations found.")?;
        return Ok(());
    }

    let rows: Vec<Vec<String>> = convs
        .iter()
        .map(|c| {
            let recruiter = c
                .recruiter_name
                .clone()
                .filter(|n| !n.is_empty())
                .or_else(|| c.recruiter_email.clone())
                .unwrap_or_default();
            vec![
                truncate(&c.company, 24),
                truncate(&recruiter, 28),
                status_label(c.status).to_string(),
                c.email_count.to_string(),
                format_last_activity(c.days_since_activity()),
            ]
        })
        .collect();

    render_columns(
        w,
        &["COMPANY", "RECRUITER", "STATUS", "EMAILS", "LAST ACTIVITY"],
        &rows,
    )
}

pub fn conversation_detail<W: Write>(
    w: &mut W,
    c: &Conversation,
    emails: &[Email],
) -> Result<(), JobError> {
    writeln!(w, "Company:     {}", c.company)?;

    match (&c.recruiter_name, &c.recruiter_email) {
        (Some(name), Some(email)) if !name.is_empty() => {
            writeln!(w, "Recruiter:   {} <{}>", name, email)?
        }
        (_, Some(email)) => writeln!(w, "Recruiter:   {}", email)?,
        (Some(name), None) => writeln!(w, "Recruiter:   {}", name)?,
        _ => {}
    }

    if let Some(position) = &c.position {
        writeln!(w, "Position:    {}", position)?;
    }
    writeln!(w, "Status:      {}", status_label(c.status))?;
    writeln!(w, "Emails:      {}", c.email_count)?;
    writeln!(
        w,
        "Last active: {}",
        c.last_activity_at.format("%Y-%m-%d %H:%M")
    )?;
    if c.archived {
        writeln!(w, "Archived:    yes")?;
    }

    if !emails.is_empty() {
        writeln!(w)?;
        writeln!(w, "Timeline:")?;
        for e in emails {
            let arrow = match e.direction {
                crate::db::models::Direction::Inbound => "<-",
                crate::db::models::Direction::Outbound => "->",
            };
            writeln!(
                w,
                "  {} {} {}  {}",
                e.date.format("%Y-%m-%d"),
                arrow,
                truncate(&e.from_address, 30),
                truncate(e.subject.as_deref().unwrap_or(""), 50),
            )?;
        }
    }

    Ok(())
}

pub fn stats_table<W: Write>(w: &mut W, stats: &Stats) -> Result<(), JobError> {
    writeln!(w, "Conversations:    {}", stats.total_conversations)?;
    writeln!(w, "  Your turn:      {}", stats.waiting_on_me)?;
    writeln!(w, "  Waiting:        {}", stats.waiting_on_them)?;
    writeln!(w, "  Stale:          {}", stats.stale)?;
    writeln!(w, "  Closed:         {}", stats.closed)?;
    writeln!(w, "Emails tracked:   {}", stats.total_emails)?;
    writeln!(w, "Response rate:    {:.0}%", stats.response_rate * 100.0)?;
    if stats.avg_response_time_days > 0.0 {
        writeln!(
            w,
            "Avg response:     {:.1} days",
            stats.avg_response_time_days
        )?;
    }
    Ok(())
}

pub fn thread_detail<W: Write>(w: &mut W, thread: &Thread) -> Result<(), JobError> {
    let c = &thread.conversation;
    writeln!(w, "Thread with {} ({} emails)", c.company, thread.emails.len())?;
    writeln!(w, "{}", "=".repeat(60))?;

    for email in &thread.emails {
        writeln!(w)?;
        let who = if email.from_name.is_empty() {
            email.from.clone()
        } else {
            format!("{} <{}>", email.from_name, email.from)
        };
        writeln!(w, "From: {}", who)?;
        writeln!(w, "Date: {}", email.date.format("%Y-%m-%d %H:%M"))?;
        if !email.subject.is_empty() {
            writeln!(w, "Subject: {}", email.subject)?;
        }
        writeln!(w, "{}", "-".repeat(60))?;
        let body = if email.body.is_empty() {
            &email.snippet
        } else {
            &email.body
        };
        writeln!(w, "{}", body.trim())?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::Direction;
    use chrono::Utc;

    fn make_conversation(company: &str) -> Conversation {
        Conversation {
            id: "c1".into(),
            company: company.into(),
            position: Some("Engineer".into()),
            recruiter_name: Some("Jane".into()),
            recruiter_email: Some("jane@acme.com".into()),
            direction: Direction::Inbound,
            status: ConversationStatus::WaitingOnMe,
            last_activity_at: Utc::now(),
            email_count: 2,
            archived: false,
            review_suggested: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn truncation_adds_ellipsis() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a very long company name", 10), "a very lo…");
    }

    #[test]
    fn table_contains_headers_and_rows() {
        let mut buf = Vec::new();
        conversations_table(&mut buf, &[make_conversation("Acme")]).unwrap();
        let text = String::from_utf8(buf).unwrap();

        assert!(text.contains("COMPANY"));
        assert!(text.contains("Acme"));
        assert!(text.contains("Jane"));
        assert!(text.contains("your turn"));
    }

    #[test]
    fn empty_table_prints_notice() {
        let mut buf = Vec::new();
        conversations_table(&mut buf, &[]).unwrap();
        assert!(String::from_utf8(buf).unwrap().contains("No conversations"));
    }

    #[test]
    fn detail_includes_position_and_status() {
        let mut buf = Vec::new();
        conversation_detail(&mut buf, &make_conversation("Acme"), &[]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("Engineer"));
        assert!(text.contains("jane@acme.com"));
    }

    #[test]
    fn last_activity_buckets() {
        assert_eq!(format_last_activity(0), "today");
        assert_eq!(format_last_activity(1), "yesterday");
        assert_eq!(format_last_activity(3), "3d ago");
        assert_eq!(format_last_activity(14), "2w ago");
        assert_eq!(format_last_activity(45), "45d ago");
    }
}
