//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Linkscrub database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Rule documents, whitelist and disabled-provider list, stored as JSON text
CREATE TABLE IF NOT EXISTS kv_store (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Outcome of the last rule resolution (single row)
CREATE TABLE IF NOT EXISTS rules_status (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    content_hash TEXT NOT NULL,
    status TEXT NOT NULL,
    resolved_at TEXT NOT NULL
);

-- Rewrite log, bounded by the application
CREATE TABLE IF NOT EXISTS log_entries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    before_url TEXT NOT NULL,
    after_url TEXT NOT NULL,
    rule TEXT NOT NULL,
    provider_name TEXT NOT NULL,
    pattern_type TEXT NOT NULL,
    pattern_value TEXT NOT NULL,
    request_method TEXT NOT NULL,
    provider_methods TEXT NOT NULL,
    request_type TEXT NOT NULL,
    provider_resource_types TEXT NOT NULL,
    timestamp INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_log_entries_timestamp ON log_entries(timestamp);

-- Rewrite counters
CREATE TABLE IF NOT EXISTS counters (
    name TEXT PRIMARY KEY,
    value INTEGER NOT NULL DEFAULT 0
);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
