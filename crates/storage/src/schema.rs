use rusqlite::Connection;

use crate::error::StorageError;

pub const SCHEMA_VERSION: i32 = 1;

pub fn init_schema(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        PRAGMA busy_timeout = 5000;
    ",
    )?;
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at INTEGER NOT NULL
);
INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (1, unixepoch());

CREATE TABLE IF NOT EXISTS documents (
    document_id BLOB PRIMARY KEY CHECK (length(document_id) = 16),
    name TEXT NOT NULL,
    saved_at BLOB NOT NULL CHECK (length(saved_at) = 12),
    checksum BLOB NOT NULL CHECK (length(checksum) = 32),
    body BLOB NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_documents_saved_at ON documents (saved_at DESC);
";
