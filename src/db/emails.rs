//! Email row queries. Rows are written once during sync and only ever
//! moved between conversations by merge.

use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};
use uuid::Uuid;

use super::models::{Direction, Email};
use super::Database;
use crate::error::JobError;

const COLS: &str = "id, conversation_id, provider_id, thread_id, subject, from_address, from_name, \
                    to_address, date, direction, snippet, body_stored, body_encrypted, \
                    classification, confidence, extracted_data, created_at";

fn from_row(row: &Row) -> rusqlite::Result<Email> {
    Ok(Email {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        provider_id: row.get(2)?,
        thread_id: row.get(3)?,
        subject: row.get(4)?,
        from_address: row.get(5)?,
        from_name: row.get(6)?,
        to_address: row.get(7)?,
        date: row.get(8)?,
        direction: Direction::from_str(&row.get::<_, String>(9)?),
        snippet: row.get(10)?,
        body_stored: row.get(11)?,
        body_encrypted: row.get(12)?,
        classification: row.get(13)?,
        confidence: row.get(14)?,
        extracted_data: row.get(15)?,
        created_at: row.get(16)?,
    })
}

impl Database {
    /// Insert a new email row, assigning an id and created timestamp.
    pub fn create_email(&self, e: &mut Email) -> Result<(), JobError> {
        if e.id.is_empty() {
            e.id = Uuid::new_v4().to_string();
        }
        e.created_at = Utc::now();

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO emails (
                id, conversation_id, provider_id, thread_id, subject, from_address, from_name,
                to_address, date, direction, snippet, body_stored, body_encrypted,
                classification, confidence, extracted_data, created_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
            params![
                e.id,
                e.conversation_id,
                e.provider_id,
                e.thread_id,
                e.subject,
                e.from_address,
                e.from_name,
                e.to_address,
                e.date,
                e.direction.as_str(),
                e.snippet,
                e.body_stored,
                e.body_encrypted,
                e.classification,
                e.confidence,
                e.extracted_data,
                e.created_at,
            ],
        )?;
        Ok(())
    }

    /// Dedup lookup: has this provider message already been ingested?
    pub fn get_email_by_provider_id(&self, provider_id: &str) -> Result<Option<Email>, JobError> {
        let conn = self.conn()?;
        let email = conn
            .query_row(
                &format!("SELECT {COLS} FROM emails WHERE provider_id = ?1"),
                params![provider_id],
                from_row,
            )
            .optional()?;
        Ok(email)
    }

    /// All emails of a conversation, oldest first.
    pub fn list_emails_for_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<Email>, JobError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLS} FROM emails WHERE conversation_id = ?1 ORDER BY date ASC"
        ))?;

        let rows = stmt.query_map(params![conversation_id], from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

#[cfg(test)]
impl Database {
    /// Insert a minimal inbound email for tests.
    pub(crate) fn insert_test_email(
        &self,
        conversation_id: &str,
        provider_id: &str,
        date: chrono::DateTime<Utc>,
    ) {
        let mut email = Email {
            id: String::new(),
            conversation_id: conversation_id.to_string(),
            provider_id: provider_id.to_string(),
            thread_id: format!("thread-{provider_id}"),
            subject: Some("test".into()),
            from_address: "sender@example.com".into(),
            from_name: None,
            to_address: None,
            date,
            direction: Direction::Inbound,
            snippet: None,
            body_stored: false,
            body_encrypted: None,
            classification: None,
            confidence: None,
            extracted_data: None,
            created_at: Utc::now(),
        };
        self.create_email(&mut email).unwrap();
    }

    /// Create a bare conversation row for tests, returning its id.
    pub(crate) fn insert_test_conversation(&self, company: &str) -> String {
        let mut conv = super::models::Conversation {
            id: String::new(),
            company: company.to_string(),
            position: None,
            recruiter_name: None,
            recruiter_email: None,
            direction: Direction::Inbound,
            status: super::models::ConversationStatus::Active,
            last_activity_at: Utc::now(),
            email_count: 0,
            archived: false,
            review_suggested: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.create_conversation(&mut conv).unwrap();
        conv.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_id_is_unique() {
        let db = Database::in_memory().unwrap();
        let conv_id = db.insert_test_conversation("Acme");

        db.insert_test_email(&conv_id, "g1", Utc::now());

        let mut dup = Email {
            id: String::new(),
            conversation_id: conv_id.clone(),
            provider_id: "g1".into(),
            thread_id: "t".into(),
            subject: None,
            from_address: "x@y.com".into(),
            from_name: None,
            to_address: None,
            date: Utc::now(),
            direction: Direction::Inbound,
            snippet: None,
            body_stored: false,
            body_encrypted: None,
            classification: None,
            confidence: None,
            extracted_data: None,
            created_at: Utc::now(),
        };
        assert!(db.create_email(&mut dup).is_err());
    }

    #[test]
    fn listing_orders_by_date_ascending() {
        let db = Database::in_memory().unwrap();
        let conv_id = db.insert_test_conversation("Acme");

        let now = Utc::now();
        db.insert_test_email(&conv_id, "later", now);
        db.insert_test_email(&conv_id, "earlier", now - chrono::Duration::days(2));

        let emails = db.list_emails_for_conversation(&conv_id).unwrap();
        assert_eq!(emails.len(), 2);
        assert_eq!(emails[0].provider_id, "earlier");
        assert_eq!(emails[1].provider_id, "later");
    }

    #[test]
    fn lookup_by_provider_id() {
        let db = Database::in_memory().unwrap();
        let conv_id = db.insert_test_conversation("Acme");
        db.insert_test_email(&conv_id, "g42", Utc::now());

        assert!(db.get_email_by_provider_id("g42").unwrap().is_some());
        assert!(db.get_email_by_provider_id("nope").unwrap().is_none());
    }
}
