//! Conversation queries.

use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};
use uuid::Uuid;

use super::models::{
    ArchiveResult, Conversation, ConversationStatus, Direction, ListOptions, MergeResult, Stats,
};
use super::Database;
use crate::error::JobError;

const COLS: &str = "id, company, position, recruiter_name, recruiter_email, direction, status, \
                    last_activity_at, email_count, archived, review_suggested, created_at, updated_at";

fn from_row(row: &Row) -> rusqlite::Result<Conversation> {
    Ok(Conversation {
        id: row.get(0)?,
        company: row.get(1)?,
        position: row.get(2)?,
        recruiter_name: row.get(3)?,
        recruiter_email: row.get(4)?,
        direction: Direction::from_str(&row.get::<_, String>(5)?),
        status: ConversationStatus::from_str(&row.get::<_, String>(6)?),
        last_activity_at: row.get(7)?,
        email_count: row.get(8)?,
        archived: row.get(9)?,
        review_suggested: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

impl Database {
    /// Insert a new conversation, assigning an id and timestamps.
    pub fn create_conversation(&self, c: &mut Conversation) -> Result<(), JobError> {
        if c.id.is_empty() {
            c.id = Uuid::new_v4().to_string();
        }
        c.created_at = Utc::now();
        c.updated_at = c.created_at;

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO conversations (
                id, company, position, recruiter_name, recruiter_email,
                direction, status, last_activity_at, email_count,
                archived, review_suggested, created_at, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                c.id,
                c.company,
                c.position,
                c.recruiter_name,
                c.recruiter_email,
                c.direction.as_str(),
                c.status.as_str(),
                c.last_activity_at,
                c.email_count,
                c.archived,
                c.review_suggested,
                c.created_at,
                c.updated_at,
            ],
        )?;
        Ok(())
    }

    pub fn get_conversation(&self, id: &str) -> Result<Option<Conversation>, JobError> {
        let conn = self.conn()?;
        let conv = conn
            .query_row(
                &format!("SELECT {COLS} FROM conversations WHERE id = ?1"),
                params![id],
                from_row,
            )
            .optional()?;
        Ok(conv)
    }

    /// Case-insensitive company lookup; most recently active wins.
    pub fn get_conversation_by_company(
        &self,
        company: &str,
    ) -> Result<Option<Conversation>, JobError> {
        let conn = self.conn()?;
        let conv = conn
            .query_row(
                &format!(
                    "SELECT {COLS} FROM conversations WHERE LOWER(company) = LOWER(?1)
                     ORDER BY last_activity_at DESC LIMIT 1"
                ),
                params![company],
                from_row,
            )
            .optional()?;
        Ok(conv)
    }

    /// Find the conversation that already contains an email of this thread.
    pub fn get_conversation_by_thread_id(
        &self,
        thread_id: &str,
    ) -> Result<Option<Conversation>, JobError> {
        let conn = self.conn()?;
        let conv = conn
            .query_row(
                "SELECT c.id, c.company, c.position, c.recruiter_name, c.recruiter_email,
                        c.direction, c.status, c.last_activity_at, c.email_count,
                        c.archived, c.review_suggested, c.created_at, c.updated_at
                 FROM conversations c
                 INNER JOIN emails e ON c.id = e.conversation_id
                 WHERE e.thread_id = ?1 LIMIT 1",
                params![thread_id],
                from_row,
            )
            .optional()?;
        Ok(conv)
    }

    pub fn get_conversation_by_recruiter_email(
        &self,
        email: &str,
    ) -> Result<Option<Conversation>, JobError> {
        let conn = self.conn()?;
        let conv = conn
            .query_row(
                &format!(
                    "SELECT {COLS} FROM conversations
                     WHERE LOWER(recruiter_email) = LOWER(?1)
                     ORDER BY last_activity_at DESC LIMIT 1"
                ),
                params![email],
                from_row,
            )
            .optional()?;
        Ok(conv)
    }

    /// Persist every mutable field of an existing conversation.
    pub fn update_conversation(&self, c: &Conversation) -> Result<(), JobError> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE conversations SET
                company = ?1, position = ?2, recruiter_name = ?3, recruiter_email = ?4,
                direction = ?5, status = ?6, last_activity_at = ?7, email_count = ?8,
                archived = ?9, review_suggested = ?10, updated_at = ?11
             WHERE id = ?12",
            params![
                c.company,
                c.position,
                c.recruiter_name,
                c.recruiter_email,
                c.direction.as_str(),
                c.status.as_str(),
                c.last_activity_at,
                c.email_count,
                c.archived,
                c.review_suggested,
                Utc::now(),
                c.id,
            ],
        )?;

        if updated == 0 {
            return Err(JobError::NotFound(format!("conversation: {}", c.id)));
        }
        Ok(())
    }

    /// List conversations, newest activity first. Archived rows are hidden
    /// unless `include_archived` is set.
    pub fn list_conversations(&self, opts: &ListOptions) -> Result<Vec<Conversation>, JobError> {
        let mut sql = format!("SELECT {COLS} FROM conversations WHERE 1=1");
        let mut args: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if !opts.include_archived {
            sql.push_str(" AND archived = 0");
        }
        if let Some(status) = opts.status {
            sql.push_str(" AND status = ?");
            args.push(Box::new(status.as_str().to_string()));
        }
        if let Some(direction) = opts.direction {
            sql.push_str(" AND direction = ?");
            args.push(Box::new(direction.as_str().to_string()));
        }
        if let Some(since) = opts.since {
            sql.push_str(" AND last_activity_at >= ?");
            args.push(Box::new(since));
        }
        if let Some(company) = &opts.company {
            sql.push_str(" AND LOWER(company) LIKE LOWER(?)");
            args.push(Box::new(format!("%{}%", company)));
        }

        sql.push_str(" ORDER BY last_activity_at DESC");
        if opts.limit > 0 {
            sql.push_str(&format!(" LIMIT {}", opts.limit));
            if opts.offset > 0 {
                sql.push_str(&format!(" OFFSET {}", opts.offset));
            }
        }

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(args.iter()), from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Free-text search across companies, positions, recruiters, and
    /// email subjects.
    pub fn search_conversations(&self, query: &str) -> Result<Vec<Conversation>, JobError> {
        let pattern = format!("%{}%", query.to_lowercase());
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT DISTINCT c.id, c.company, c.position, c.recruiter_name, c.recruiter_email,
                    c.direction, c.status, c.last_activity_at, c.email_count,
                    c.archived, c.review_suggested, c.created_at, c.updated_at
             FROM conversations c
             LEFT JOIN emails e ON c.id = e.conversation_id
             WHERE LOWER(c.company) LIKE ?1
                OR LOWER(c.position) LIKE ?1
                OR LOWER(c.recruiter_name) LIKE ?1
                OR LOWER(c.recruiter_email) LIKE ?1
                OR LOWER(e.subject) LIKE ?1
             ORDER BY c.last_activity_at DESC",
        )?;

        let rows = stmt.query_map(params![pattern], from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Resolve a user-supplied identifier: company name first, then id,
    /// then first search hit.
    pub fn find_conversation(&self, identifier: &str) -> Result<Option<Conversation>, JobError> {
        if let Some(conv) = self.get_conversation_by_company(identifier)? {
            return Ok(Some(conv));
        }
        if let Some(conv) = self.get_conversation(identifier)? {
            return Ok(Some(conv));
        }
        let mut results = self.search_conversations(identifier)?;
        if results.is_empty() {
            Ok(None)
        } else {
            Ok(Some(results.remove(0)))
        }
    }

    pub fn increment_email_count(&self, id: &str) -> Result<(), JobError> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE conversations SET email_count = email_count + 1, updated_at = ?1 WHERE id = ?2",
            params![Utc::now(), id],
        )?;
        Ok(())
    }

    /// Move every email from `source_id` into `target_id`, recompute the
    /// target's counters, and delete the source. All-or-nothing.
    pub fn merge_conversations(
        &self,
        target_id: &str,
        source_id: &str,
    ) -> Result<MergeResult, JobError> {
        if target_id == source_id {
            return Err(JobError::Other(
                "cannot merge a conversation with itself".into(),
            ));
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(JobError::from)?;

        let moved = tx.execute(
            "UPDATE emails SET conversation_id = ?1 WHERE conversation_id = ?2",
            params![target_id, source_id],
        )?;

        tx.execute(
            "UPDATE conversations SET
                email_count = (SELECT COUNT(*) FROM emails WHERE conversation_id = ?1),
                last_activity_at = (SELECT MAX(date) FROM emails WHERE conversation_id = ?1),
                updated_at = ?2
             WHERE id = ?1",
            params![target_id, Utc::now()],
        )?;

        let deleted = tx.execute("DELETE FROM conversations WHERE id = ?1", params![source_id])?;
        if deleted == 0 {
            return Err(JobError::NotFound(format!("conversation: {}", source_id)));
        }

        let total: i64 = tx.query_row(
            "SELECT email_count FROM conversations WHERE id = ?1",
            params![target_id],
            |row| row.get(0),
        )?;

        tx.commit().map_err(JobError::from)?;

        Ok(MergeResult {
            target_id: target_id.to_string(),
            source_id: source_id.to_string(),
            emails_moved: moved as i64,
            total_emails: total,
        })
    }

    pub fn archive_conversation(&self, id: &str) -> Result<ArchiveResult, JobError> {
        self.set_archived(id, true)
    }

    pub fn unarchive_conversation(&self, id: &str) -> Result<ArchiveResult, JobError> {
        self.set_archived(id, false)
    }

    fn set_archived(&self, id: &str, archived: bool) -> Result<ArchiveResult, JobError> {
        let conn = self.conn()?;
        let company: String = conn
            .query_row(
                "SELECT company FROM conversations WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| JobError::NotFound(format!("conversation: {}", id)))?;

        conn.execute(
            "UPDATE conversations SET archived = ?1, updated_at = ?2 WHERE id = ?3",
            params![archived, Utc::now(), id],
        )?;

        Ok(ArchiveResult {
            conversation_id: id.to_string(),
            company,
            archived,
        })
    }

    /// Counts by status plus the canonical response rate: the fraction of
    /// inbound conversations that got at least one reply.
    pub fn stats(&self, since: Option<chrono::DateTime<Utc>>) -> Result<Stats, JobError> {
        let conn = self.conn()?;
        let mut stats = Stats::default();

        let (where_clause, args) = match since {
            Some(ts) => (
                "WHERE last_activity_at >= ?1".to_string(),
                vec![ts],
            ),
            None => (String::new(), vec![]),
        };

        let sql = format!(
            "SELECT COUNT(*),
                    SUM(CASE WHEN status = 'waiting_on_me' THEN 1 ELSE 0 END),
                    SUM(CASE WHEN status = 'waiting_on_them' THEN 1 ELSE 0 END),
                    SUM(CASE WHEN status = 'stale' THEN 1 ELSE 0 END),
                    SUM(CASE WHEN status = 'closed' THEN 1 ELSE 0 END),
                    SUM(CASE WHEN direction = 'inbound' THEN 1 ELSE 0 END),
                    SUM(CASE WHEN direction = 'inbound' AND email_count >= 2 THEN 1 ELSE 0 END)
             FROM conversations {where_clause}"
        );

        let (inbound, replied) = conn.query_row(
            &sql,
            rusqlite::params_from_iter(args.iter()),
            |row| {
                stats.total_conversations = row.get::<_, Option<i64>>(0)?.unwrap_or(0);
                stats.waiting_on_me = row.get::<_, Option<i64>>(1)?.unwrap_or(0);
                stats.waiting_on_them = row.get::<_, Option<i64>>(2)?.unwrap_or(0);
                stats.stale = row.get::<_, Option<i64>>(3)?.unwrap_or(0);
                stats.closed = row.get::<_, Option<i64>>(4)?.unwrap_or(0);
                Ok((
                    row.get::<_, Option<i64>>(5)?.unwrap_or(0),
                    row.get::<_, Option<i64>>(6)?.unwrap_or(0),
                ))
            },
        )?;

        if inbound > 0 {
            stats.response_rate = replied as f64 / inbound as f64;
        }

        let email_sql = match since {
            Some(_) => "SELECT COUNT(*) FROM emails WHERE date >= ?1",
            None => "SELECT COUNT(*) FROM emails",
        };
        stats.total_emails = conn.query_row(
            email_sql,
            rusqlite::params_from_iter(args.iter()),
            |row| row.get(0),
        )?;

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn make_conversation(company: &str, recruiter: &str) -> Conversation {
        Conversation {
            id: String::new(),
            company: company.to_string(),
            position: None,
            recruiter_name: None,
            recruiter_email: Some(recruiter.to_string()),
            direction: Direction::Inbound,
            status: ConversationStatus::Active,
            last_activity_at: Utc::now(),
            email_count: 0,
            archived: false,
            review_suggested: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn create_and_lookup() {
        let db = Database::in_memory().unwrap();
        let mut conv = make_conversation("Acme", "jane@acme.com");
        db.create_conversation(&mut conv).unwrap();
        assert!(!conv.id.is_empty());

        let by_id = db.get_conversation(&conv.id).unwrap().unwrap();
        assert_eq!(by_id.company, "Acme");

        let by_company = db.get_conversation_by_company("acme").unwrap().unwrap();
        assert_eq!(by_company.id, conv.id);

        let by_recruiter = db
            .get_conversation_by_recruiter_email("JANE@ACME.COM")
            .unwrap()
            .unwrap();
        assert_eq!(by_recruiter.id, conv.id);

        assert!(db.get_conversation("missing").unwrap().is_none());
    }

    #[test]
    fn list_filters_by_status_and_archive() {
        let db = Database::in_memory().unwrap();

        let mut active = make_conversation("Acme", "a@acme.com");
        db.create_conversation(&mut active).unwrap();

        let mut stale = make_conversation("Globex", "b@globex.com");
        stale.status = ConversationStatus::Stale;
        db.create_conversation(&mut stale).unwrap();

        let mut archived = make_conversation("Initech", "c@initech.com");
        archived.archived = true;
        db.create_conversation(&mut archived).unwrap();

        let all = db.list_conversations(&ListOptions::default()).unwrap();
        assert_eq!(all.len(), 2); // archived hidden by default

        let with_archived = db
            .list_conversations(&ListOptions {
                include_archived: true,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(with_archived.len(), 3);

        let stale_only = db
            .list_conversations(&ListOptions {
                status: Some(ConversationStatus::Stale),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(stale_only.len(), 1);
        assert_eq!(stale_only[0].company, "Globex");
    }

    #[test]
    fn merge_moves_emails_and_deletes_source() {
        let db = Database::in_memory().unwrap();

        let mut target = make_conversation("Acme", "a@acme.com");
        db.create_conversation(&mut target).unwrap();
        let mut source = make_conversation("Acme Inc", "a@acme.com");
        db.create_conversation(&mut source).unwrap();

        let base = Utc::now() - Duration::days(10);
        for i in 0..5 {
            db.insert_test_email(&target.id, &format!("t{i}"), base + Duration::days(i));
        }
        for i in 0..3 {
            db.insert_test_email(&source.id, &format!("s{i}"), base + Duration::days(5 + i));
        }

        let result = db.merge_conversations(&target.id, &source.id).unwrap();
        assert_eq!(result.emails_moved, 3);
        assert_eq!(result.total_emails, 8);

        assert!(db.get_conversation(&source.id).unwrap().is_none());

        let merged = db.get_conversation(&target.id).unwrap().unwrap();
        assert_eq!(merged.email_count, 8);
        // last_activity_at is the max date over all eight emails
        assert_eq!(
            merged.last_activity_at.timestamp(),
            (base + Duration::days(7)).timestamp()
        );
    }

    #[test]
    fn merge_with_self_is_rejected() {
        let db = Database::in_memory().unwrap();
        let mut conv = make_conversation("Acme", "a@acme.com");
        db.create_conversation(&mut conv).unwrap();
        assert!(db.merge_conversations(&conv.id, &conv.id).is_err());
    }

    #[test]
    fn archive_roundtrip() {
        let db = Database::in_memory().unwrap();
        let mut conv = make_conversation("Acme", "a@acme.com");
        db.create_conversation(&mut conv).unwrap();

        let result = db.archive_conversation(&conv.id).unwrap();
        assert!(result.archived);
        assert!(db.get_conversation(&conv.id).unwrap().unwrap().archived);

        let result = db.unarchive_conversation(&conv.id).unwrap();
        assert!(!result.archived);
    }

    #[test]
    fn stats_counts_and_response_rate() {
        let db = Database::in_memory().unwrap();

        // Inbound with a reply (email_count >= 2)
        let mut replied = make_conversation("Acme", "a@acme.com");
        replied.email_count = 3;
        db.create_conversation(&mut replied).unwrap();

        // Inbound with no reply
        let mut silent = make_conversation("Globex", "b@globex.com");
        silent.email_count = 1;
        silent.status = ConversationStatus::WaitingOnMe;
        db.create_conversation(&mut silent).unwrap();

        let stats = db.stats(None).unwrap();
        assert_eq!(stats.total_conversations, 2);
        assert_eq!(stats.waiting_on_me, 1);
        assert!((stats.response_rate - 0.5).abs() < 1e-9);
    }
}
