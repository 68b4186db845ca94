//! CSV export of conversations.

use std::io::Write;

use crate::db::models::Conversation;
use crate::error::JobError;

/// Write conversations as CSV, one row each.
pub fn write_conversations_csv<W: Write>(
    w: W,
    convs: &[Conversation],
) -> Result<(), JobError> {
    let mut writer = csv::Writer::from_writer(w);

    writer
        .write_record([
            "company",
            "position",
            "recruiter_name",
            "recruiter_email",
            "status",
            "direction",
            "email_count",
            "last_activity_at",
            "archived",
            "created_at",
        ])
        .map_err(|e| JobError::Io(e.to_string()))?;

    for c in convs {
        writer
            .write_record([
                c.company.as_str(),
                c.position.as_deref().unwrap_or(""),
                c.recruiter_name.as_deref().unwrap_or(""),
                c.recruiter_email.as_deref().unwrap_or(""),
                c.status.as_str(),
                c.direction.as_str(),
                &c.email_count.to_string(),
                &c.last_activity_at.to_rfc3339(),
                if c.archived { "true" } else { "false" },
                &c.created_at.to_rfc3339(),
            ])
            .map_err(|e| JobError::Io(e.to_string()))?;
    }

    writer.flush()?;
    Ok(())
}
