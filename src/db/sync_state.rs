//! Sync cursor (singleton row). Advanced only after a run completes.

use rusqlite::params;

use super::models::SyncState;
use super::Database;
use crate::error::JobError;

impl Database {
    pub fn get_sync_state(&self) -> Result<SyncState, JobError> {
        let conn = self.conn()?;
        let state = conn.query_row(
            "SELECT id, last_sync_at, last_history_id, emails_processed FROM sync_state WHERE id = 1",
            [],
            |row| {
                Ok(SyncState {
                    id: row.get(0)?,
                    last_sync_at: row.get(1)?,
                    last_history_id: row.get(2)?,
                    emails_processed: row.get(3)?,
                })
            },
        )?;
        Ok(state)
    }

    pub fn update_sync_state(&self, state: &SyncState) -> Result<(), JobError> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE sync_state SET last_sync_at = ?1, last_history_id = ?2, emails_processed = ?3
             WHERE id = 1",
            params![state.last_sync_at, state.last_history_id, state.emails_processed],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn seeded_on_create_and_updatable() {
        let db = Database::in_memory().unwrap();

        let state = db.get_sync_state().unwrap();
        assert!(state.last_sync_at.is_none());
        assert_eq!(state.emails_processed, 0);

        let now = Utc::now();
        db.update_sync_state(&SyncState {
            id: 1,
            last_sync_at: Some(now),
            last_history_id: Some("h-123".into()),
            emails_processed: 42,
        })
        .unwrap();

        let state = db.get_sync_state().unwrap();
        assert_eq!(state.emails_processed, 42);
        assert_eq!(state.last_history_id.as_deref(), Some("h-123"));
        assert_eq!(state.last_sync_at.unwrap().timestamp(), now.timestamp());
    }
}
