//! Per-day classification counters, upserted as the pipeline runs.

use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use super::models::ClassificationMetrics;
use super::Database;
use crate::error::JobError;

/// Which counter to bump.
#[derive(Debug, Clone, Copy)]
pub enum MetricField {
    Processed,
    AutoIncluded,
    Validated,
    Excluded,
    FalsePositives,
}

impl MetricField {
    fn column(&self) -> &'static str {
        match self {
            Self::Processed => "processed",
            Self::AutoIncluded => "auto_included",
            Self::Validated => "validated",
            Self::Excluded => "excluded",
            Self::FalsePositives => "false_positives",
        }
    }
}

impl Database {
    /// Add `delta` to today's counter for `field`.
    pub fn record_metric(&self, field: MetricField, delta: i64) -> Result<(), JobError> {
        let day = Utc::now().format("%Y-%m-%d").to_string();
        let col = field.column();

        let conn = self.conn()?;
        conn.execute(
            &format!(
                "INSERT INTO classification_metrics (day, {col}) VALUES (?1, ?2)
                 ON CONFLICT(day) DO UPDATE SET {col} = {col} + ?2"
            ),
            params![day, delta],
        )?;
        Ok(())
    }

    pub fn get_metrics(&self, day: &str) -> Result<ClassificationMetrics, JobError> {
        let conn = self.conn()?;
        let metrics = conn
            .query_row(
                "SELECT day, processed, auto_included, validated, excluded, false_positives
                 FROM classification_metrics WHERE day = ?1",
                params![day],
                |row| {
                    Ok(ClassificationMetrics {
                        day: row.get(0)?,
                        processed: row.get(1)?,
                        auto_included: row.get(2)?,
                        validated: row.get(3)?,
                        excluded: row.get(4)?,
                        false_positives: row.get(5)?,
                    })
                },
            )
            .optional()?;

        Ok(metrics.unwrap_or(ClassificationMetrics {
            day: day.to_string(),
            ..Default::default()
        }))
    }

    /// All recorded days, newest first.
    pub fn list_metrics(&self, limit: usize) -> Result<Vec<ClassificationMetrics>, JobError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT day, processed, auto_included, validated, excluded, false_positives
             FROM classification_metrics ORDER BY day DESC LIMIT ?1",
        )?;

        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(ClassificationMetrics {
                day: row.get(0)?,
                processed: row.get(1)?,
                auto_included: row.get(2)?,
                validated: row.get(3)?,
                excluded: row.get(4)?,
                false_positives: row.get(5)?,
            })
        })?;

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
    fn counters_accumulate_per_day() {
        let db = Database::in_memory().unwrap();
        let today = Utc::now().format("%Y-%m-%d").to_string();

        db.record_metric(MetricField::Processed, 5).unwrap();
        db.record_metric(MetricField::Processed, 3).unwrap();
        db.record_metric(MetricField::Excluded, 1).unwrap();

        let m = db.get_metrics(&today).unwrap();
        assert_eq!(m.processed, 8);
        assert_eq!(m.excluded, 1);
        assert_eq!(m.validated, 0);

        let missing = db.get_metrics("1999-01-01").unwrap();
        assert_eq!(missing.processed, 0);
    }
}
