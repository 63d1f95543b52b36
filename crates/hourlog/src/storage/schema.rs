//! `SQLite` schema definitions for the shared session store.
//!
//! This module contains the SQL statements for creating and managing
//! the database schema.

/// SQL statement to create the sessions table.
///
/// `timestamp` is the write time assigned by the store, stored as fixed-width
/// RFC 3339 so that text ordering matches time ordering.
pub const CREATE_SESSIONS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS sessions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    class TEXT NOT NULL DEFAULT '',
    date TEXT NOT NULL,
    type TEXT NOT NULL,
    start_time TEXT NOT NULL,
    end_time TEXT NOT NULL,
    duration REAL NOT NULL,
    timestamp TEXT NOT NULL
)
";

/// SQL statement to create an index on timestamp for newest-first snapshots.
pub const CREATE_TIMESTAMP_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_sessions_timestamp ON sessions(timestamp DESC, id DESC)
";

/// SQL statement to create an index on instructor name for filtering.
pub const CREATE_NAME_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_sessions_name ON sessions(name)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_SESSIONS_TABLE,
    CREATE_TIMESTAMP_INDEX,
    CREATE_NAME_INDEX,
    CREATE_METADATA_TABLE,
];

/// Columns selected for every session query, in `row_to_session` order.
pub const SESSION_COLUMNS: &str =
    "name, class, date, type, start_time, end_time, duration, timestamp";
