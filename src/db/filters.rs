//! Learned-filter queries: the persistent half of the self-learning
//! blacklist/whitelist.
//!
//! A `domain_blacklist` row becomes active once it is user-created,
//! AI-confirmed, or its false-positive count crosses the auto-promotion
//! threshold.

use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};
use uuid::Uuid;

use super::models::{FilterSource, FilterType, LearnedFilter};
use super::Database;
use crate::error::JobError;

/// False positives from one domain before it is blacklisted automatically.
pub const AUTO_BLACKLIST_THRESHOLD: i64 = 3;

const COLS: &str =
    "id, filter_type, value, source, confidence, false_positive_count, auto_blacklisted, created_at";

fn from_row(row: &Row) -> rusqlite::Result<LearnedFilter> {
    let type_str: String = row.get(1)?;
    Ok(LearnedFilter {
        id: row.get(0)?,
        filter_type: FilterType::from_str(&type_str).unwrap_or(FilterType::DomainBlacklist),
        value: row.get(2)?,
        source: FilterSource::from_str(&row.get::<_, String>(3)?),
        confidence: row.get(4)?,
        false_positive_count: row.get(5)?,
        auto_blacklisted: row.get(6)?,
        created_at: row.get(7)?,
    })
}

impl Database {
    pub fn create_learned_filter(&self, f: &mut LearnedFilter) -> Result<(), JobError> {
        if f.id.is_empty() {
            f.id = Uuid::new_v4().to_string();
        }
        f.created_at = Utc::now();

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO learned_filters (
                id, filter_type, value, source, confidence,
                false_positive_count, auto_blacklisted, created_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                f.id,
                f.filter_type.as_str(),
                f.value,
                f.source.as_str(),
                f.confidence,
                f.false_positive_count,
                f.auto_blacklisted,
                f.created_at,
            ],
        )?;
        Ok(())
    }

    pub fn learned_filter_exists(
        &self,
        filter_type: FilterType,
        value: &str,
    ) -> Result<bool, JobError> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM learned_filters WHERE filter_type = ?1 AND LOWER(value) = LOWER(?2)",
            params![filter_type.as_str(), value],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// List learned filters, optionally restricted to one source.
    pub fn list_learned_filters(
        &self,
        source: Option<FilterSource>,
    ) -> Result<Vec<LearnedFilter>, JobError> {
        let conn = self.conn()?;
        let mut out = Vec::new();

        match source {
            Some(src) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {COLS} FROM learned_filters WHERE source = ?1 ORDER BY created_at DESC"
                ))?;
                let rows = stmt.query_map(params![src.as_str()], from_row)?;
                for row in rows {
                    out.push(row?);
                }
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {COLS} FROM learned_filters ORDER BY created_at DESC"
                ))?;
                let rows = stmt.query_map([], from_row)?;
                for row in rows {
                    out.push(row?);
                }
            }
        }

        Ok(out)
    }

    /// Flip an `ai_suggested` rule to `ai_confirmed`.
    pub fn approve_learned_filter(&self, id: &str) -> Result<(), JobError> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE learned_filters SET source = 'ai_confirmed'
             WHERE id = ?1 AND source = 'ai_suggested'",
            params![id],
        )?;
        if updated == 0 {
            return Err(JobError::NotFound(format!("suggested filter: {}", id)));
        }
        Ok(())
    }

    pub fn delete_learned_filter(&self, id: &str) -> Result<(), JobError> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM learned_filters WHERE id = ?1", params![id])?;
        if deleted == 0 {
            return Err(JobError::NotFound(format!("learned filter: {}", id)));
        }
        Ok(())
    }

    /// Record one false positive against a domain, creating the blacklist
    /// row on first report. Upsert keeps this atomic under concurrency.
    pub fn mark_false_positive(&self, domain: &str) -> Result<(), JobError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO learned_filters (
                id, filter_type, value, source, false_positive_count, auto_blacklisted, created_at
             ) VALUES (?1, 'domain_blacklist', LOWER(?2), 'user', 1, 0, ?3)
             ON CONFLICT(filter_type, value)
             DO UPDATE SET false_positive_count = false_positive_count + 1",
            params![Uuid::new_v4().to_string(), domain, Utc::now()],
        )?;
        Ok(())
    }

    pub fn get_false_positive_count(&self, domain: &str) -> Result<i64, JobError> {
        let conn = self.conn()?;
        let count = conn
            .query_row(
                "SELECT false_positive_count FROM learned_filters
                 WHERE filter_type = 'domain_blacklist' AND LOWER(value) = LOWER(?1)",
                params![domain],
                |row| row.get(0),
            )
            .optional()?;
        Ok(count.unwrap_or(0))
    }

    /// Mark a domain's blacklist rule as active regardless of its source.
    pub fn promote_to_auto_blacklist(&self, domain: &str) -> Result<(), JobError> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE learned_filters SET auto_blacklisted = 1
             WHERE filter_type = 'domain_blacklist' AND LOWER(value) = LOWER(?1)",
            params![domain],
        )?;
        Ok(())
    }

    /// Active blacklist domains: user-created, AI-confirmed, auto-promoted,
    /// or past the false-positive threshold.
    pub fn get_learned_blacklist(&self) -> Result<Vec<String>, JobError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT value FROM learned_filters
             WHERE filter_type = 'domain_blacklist'
               AND (source IN ('user', 'ai_confirmed')
                    OR auto_blacklisted = 1
                    OR false_positive_count >= ?1)",
        )?;

        let rows = stmt.query_map(params![AUTO_BLACKLIST_THRESHOLD], |row| row.get(0))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Active learned values of a given type for merging into the filter.
    /// Only user and AI-confirmed rules apply; suggestions stay inert.
    pub fn get_active_learned(&self, filter_type: FilterType) -> Result<Vec<String>, JobError> {
        if filter_type == FilterType::DomainBlacklist {
            return self.get_learned_blacklist();
        }

        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT value FROM learned_filters
             WHERE filter_type = ?1 AND source IN ('user', 'ai_confirmed')",
        )?;

        let rows = stmt.query_map(params![filter_type.as_str()], |row| row.get(0))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suggestions_stay_inert_until_approved() {
        let db = Database::in_memory().unwrap();

        let mut f = LearnedFilter {
            id: String::new(),
            filter_type: FilterType::DomainWhitelist,
            value: "acme.com".into(),
            source: FilterSource::AiSuggested,
            confidence: Some(0.9),
            false_positive_count: 0,
            auto_blacklisted: false,
            created_at: Utc::now(),
        };
        db.create_learned_filter(&mut f).unwrap();

        assert!(db
            .get_active_learned(FilterType::DomainWhitelist)
            .unwrap()
            .is_empty());

        db.approve_learned_filter(&f.id).unwrap();
        assert_eq!(
            db.get_active_learned(FilterType::DomainWhitelist).unwrap(),
            vec!["acme.com".to_string()]
        );

        // Approving twice is an error: the rule is no longer ai_suggested.
        assert!(db.approve_learned_filter(&f.id).is_err());
    }

    #[test]
    fn false_positive_counter_accumulates() {
        let db = Database::in_memory().unwrap();

        db.mark_false_positive("spam.example").unwrap();
        db.mark_false_positive("spam.example").unwrap();
        assert_eq!(db.get_false_positive_count("spam.example").unwrap(), 2);
        assert_eq!(db.get_false_positive_count("other.example").unwrap(), 0);
    }

    #[test]
    fn threshold_activates_blacklist() {
        let db = Database::in_memory().unwrap();

        // A user-created blacklist row is active immediately...
        db.mark_false_positive("noisy.example").unwrap();
        assert!(db
            .get_learned_blacklist()
            .unwrap()
            .contains(&"noisy.example".to_string()));

        // ...and an ai_suggested one only after the threshold.
        let mut f = LearnedFilter {
            id: String::new(),
            filter_type: FilterType::DomainBlacklist,
            value: "suggested.example".into(),
            source: FilterSource::AiSuggested,
            confidence: None,
            false_positive_count: 0,
            auto_blacklisted: false,
            created_at: Utc::now(),
        };
        db.create_learned_filter(&mut f).unwrap();
        assert!(!db
            .get_learned_blacklist()
            .unwrap()
            .contains(&"suggested.example".to_string()));

        for _ in 0..AUTO_BLACKLIST_THRESHOLD {
            db.mark_false_positive("suggested.example").unwrap();
        }
        assert!(db
            .get_learned_blacklist()
            .unwrap()
            .contains(&"suggested.example".to_string()));
    }

    #[test]
    fn delete_removes_rule() {
        let db = Database::in_memory().unwrap();
        db.mark_false_positive("gone.example").unwrap();

        let filters = db.list_learned_filters(None).unwrap();
        assert_eq!(filters.len(), 1);
        db.delete_learned_filter(&filters[0].id).unwrap();
        assert!(db.list_learned_filters(None).unwrap().is_empty());
        assert!(db.delete_learned_filter("missing").is_err());
    }
}
