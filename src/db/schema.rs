use rusqlite::Connection;

use crate::error::JobError;

/// Create tables and indexes. Idempotent; safe to run on every open.
pub fn initialize(conn: &Connection) -> Result<(), JobError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS conversations (
            id               TEXT PRIMARY KEY,       -- UUID
            company          TEXT NOT NULL,
            position         TEXT,
            recruiter_name   TEXT,
            recruiter_email  TEXT,
            direction        TEXT NOT NULL,          -- 'inbound' | 'outbound'
            status           TEXT NOT NULL,
            last_activity_at TEXT NOT NULL,          -- RFC 3339
            email_count      INTEGER NOT NULL DEFAULT 0,
            archived         INTEGER NOT NULL DEFAULT 0,
            review_suggested INTEGER NOT NULL DEFAULT 0,
            created_at       TEXT NOT NULL,
            updated_at       TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_conversations_status
            ON conversations(status);
        CREATE INDEX IF NOT EXISTS idx_conversations_recruiter
            ON conversations(recruiter_email);
        CREATE INDEX IF NOT EXISTS idx_conversations_activity
            ON conversations(last_activity_at DESC);

        CREATE TABLE IF NOT EXISTS emails (
            id              TEXT PRIMARY KEY,        -- UUID
            conversation_id TEXT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
            provider_id     TEXT NOT NULL UNIQUE,
            thread_id       TEXT NOT NULL,
            subject         TEXT,
            from_address    TEXT NOT NULL,
            from_name       TEXT,
            to_address      TEXT,
            date            TEXT NOT NULL,           -- RFC 3339
            direction       TEXT NOT NULL,
            snippet         TEXT,
            body_stored     INTEGER NOT NULL DEFAULT 0,
            body_encrypted  TEXT,
            classification  TEXT,                    -- filter layer that admitted it
            confidence      REAL,
            extracted_data  TEXT,                    -- JSON from the classifier
            created_at      TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_emails_conversation
            ON emails(conversation_id, date ASC);
        CREATE INDEX IF NOT EXISTS idx_emails_thread
            ON emails(thread_id);

        CREATE TABLE IF NOT EXISTS sync_state (
            id               INTEGER PRIMARY KEY CHECK (id = 1),
            last_sync_at     TEXT,
            last_history_id  TEXT,
            emails_processed INTEGER NOT NULL DEFAULT 0
        );

        INSERT OR IGNORE INTO sync_state (id, emails_processed) VALUES (1, 0);

        CREATE TABLE IF NOT EXISTS learned_filters (
            id                   TEXT PRIMARY KEY,   -- UUID
            filter_type          TEXT NOT NULL,
            value                TEXT NOT NULL,
            source               TEXT NOT NULL,      -- 'user' | 'ai_suggested' | 'ai_confirmed'
            confidence           REAL,
            false_positive_count INTEGER NOT NULL DEFAULT 0,
            auto_blacklisted     INTEGER NOT NULL DEFAULT 0,
            created_at           TEXT NOT NULL,
            UNIQUE(filter_type, value)
        );

        CREATE TABLE IF NOT EXISTS classification_metrics (
            day             TEXT PRIMARY KEY,        -- YYYY-MM-DD
            processed       INTEGER NOT NULL DEFAULT 0,
            auto_included   INTEGER NOT NULL DEFAULT 0,
            validated       INTEGER NOT NULL DEFAULT 0,
            excluded        INTEGER NOT NULL DEFAULT 0,
            false_positives INTEGER NOT NULL DEFAULT 0
        );
        ",
    )?;

    Ok(())
}
