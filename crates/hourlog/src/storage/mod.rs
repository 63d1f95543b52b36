//! `SQLite` storage for the shared session log.
//!
//! Every write is stamped with a store-assigned timestamp that never goes
//! backwards, so readers in different processes see the same newest-first
//! order.

pub mod migrations;
pub mod schema;

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use tracing::{debug, info, warn};

use crate::duration::{CLOCK_FORMAT, DATE_FORMAT};
use crate::error::{Error, Result};
use crate::session::{Session, SessionType};

use schema::SESSION_COLUMNS;

/// How long a connection waits for another writer when no deadline is given.
const BUSY_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

/// Storage engine for logged sessions.
#[derive(Debug)]
pub struct Storage {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
}

impl Storage {
    /// Open or create a storage database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    /// Initializes the schema if this is a new database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        // WAL lets other processes read while one writes
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        migrations::initialize_schema(&conn)?;

        info!("Database opened successfully at {}", path.display());
        Ok(Self { path, conn })
    }

    /// Create an in-memory storage instance for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a session.
    ///
    /// Returns the session as stored, stamped with its write time. The stamp
    /// is the current time, or one microsecond after the newest stored stamp
    /// if the clock has not moved past it.
    ///
    /// With a `deadline`, the insert is committed only if it completes before
    /// then; otherwise it is rolled back.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] if the deadline passes first, in which case
    /// nothing is stored, or an error if the database operation fails.
    pub fn insert(&self, session: &Session, deadline: Option<Instant>) -> Result<Session> {
        let stamp = self.immediate("append session", deadline, |conn| {
            let newest: Option<String> =
                conn.query_row("SELECT MAX(timestamp) FROM sessions", [], |row| row.get(0))?;
            // Stamps are stored with microsecond precision
            let mut stamp = Utc::now().trunc_subsecs(6);
            if let Some(newest) = newest.as_deref().and_then(parse_stamp) {
                if stamp <= newest {
                    stamp = newest + Duration::microseconds(1);
                }
            }

            conn.execute(
                r"
                INSERT INTO sessions (name, class, date, type, start_time, end_time, duration, timestamp)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                ",
                params![
                    session.instructor_name,
                    session.class_name,
                    session.date.format(DATE_FORMAT).to_string(),
                    session.session_type.to_string(),
                    session.start.format(CLOCK_FORMAT).to_string(),
                    session.end.format(CLOCK_FORMAT).to_string(),
                    session.duration_hours,
                    format_stamp(stamp),
                ],
            )?;
            Ok(stamp)
        })?;

        debug!(
            "Inserted session for {} with id {}",
            session.instructor_name,
            self.conn.last_insert_rowid()
        );
        Ok(session.clone().stamped(stamp))
    }

    /// Get every session, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn all(&self) -> Result<Vec<Session>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions ORDER BY timestamp DESC, id DESC"
        ))?;

        let sessions = stmt
            .query_map([], Self::row_to_session)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(sessions)
    }

    /// Count stored sessions.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn count(&self) -> Result<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Delete every session in one transaction.
    ///
    /// Returns the number of sessions deleted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] if `deadline` passes first, or an error if
    /// the database operation fails; nothing is deleted in either case.
    pub fn delete_all(&self, deadline: Option<Instant>) -> Result<usize> {
        let affected = self.immediate("delete all sessions", deadline, |conn| {
            Ok(conn.execute("DELETE FROM sessions", [])?)
        })?;

        info!("Deleted {} sessions", affected);
        Ok(affected)
    }

    /// Current `PRAGMA data_version`.
    ///
    /// The value changes whenever another connection commits to the database,
    /// which is how the shared store notices remote writes.
    ///
    /// # Errors
    ///
    /// Returns an error if the pragma cannot be read.
    pub fn data_version(&self) -> Result<i64> {
        let version: i64 = self
            .conn
            .query_row("PRAGMA data_version", [], |row| row.get(0))?;
        Ok(version)
    }

    /// Get database statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stats(&self) -> Result<StorageStats> {
        let total_sessions = self.count()?;

        let (oldest, newest): (Option<String>, Option<String>) = self
            .conn
            .query_row(
                "SELECT MIN(timestamp), MAX(timestamp) FROM sessions",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?
            .unwrap_or((None, None));

        let db_size_bytes = if self.path.to_string_lossy() == ":memory:" {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(StorageStats {
            total_sessions,
            oldest_session: oldest.as_deref().and_then(parse_stamp),
            newest_session: newest.as_deref().and_then(parse_stamp),
            db_size_bytes,
        })
    }

    /// Run `work` inside a `BEGIN IMMEDIATE` transaction.
    ///
    /// Taking the write lock up front keeps two processes from both reading
    /// the newest stamp before either writes. With a deadline, waiting for the
    /// lock is bounded by the time left, and the transaction is rolled back
    /// instead of committed once the deadline has passed.
    fn immediate<T>(
        &self,
        operation: &str,
        deadline: Option<Instant>,
        work: impl FnOnce(&Connection) -> Result<T>,
    ) -> Result<T> {
        self.begin_immediate(operation, deadline)?;

        let outcome = work(&self.conn).and_then(|value| {
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                return Err(Error::timeout(operation));
            }
            Ok(value)
        });

        match outcome {
            Ok(value) => {
                if let Err(err) = self.conn.execute_batch("COMMIT") {
                    self.rollback();
                    return Err(err.into());
                }
                Ok(value)
            }
            Err(err) => {
                self.rollback();
                Err(err)
            }
        }
    }

    fn begin_immediate(&self, operation: &str, deadline: Option<Instant>) -> Result<()> {
        let Some(deadline) = deadline else {
            self.conn.execute_batch("BEGIN IMMEDIATE")?;
            return Ok(());
        };

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(Error::timeout(operation));
        }
        self.conn.busy_timeout(remaining)?;
        let begun = self.conn.execute_batch("BEGIN IMMEDIATE");
        if let Err(err) = self.conn.busy_timeout(BUSY_TIMEOUT) {
            warn!("Failed to restore busy timeout: {}", err);
        }

        match begun {
            Ok(()) => Ok(()),
            Err(err)
                if matches!(
                    err.sqlite_error_code(),
                    Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
                ) =>
            {
                debug!("Write lock not available before the deadline: {}", err);
                Err(Error::timeout(operation))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn rollback(&self) {
        if let Err(err) = self.conn.execute_batch("ROLLBACK") {
            warn!("Rollback failed: {}", err);
        }
    }

    /// Convert a database row to a Session.
    fn row_to_session(row: &rusqlite::Row) -> rusqlite::Result<Session> {
        let date: String = row.get(2)?;
        let session_type: String = row.get(3)?;
        let start: String = row.get(4)?;
        let end: String = row.get(5)?;
        let timestamp: String = row.get(7)?;

        Ok(Session {
            instructor_name: row.get(0)?,
            class_name: row.get(1)?,
            date: NaiveDate::parse_from_str(&date, DATE_FORMAT)
                .map_err(|e| conversion_error(2, e))?,
            session_type: SessionType::from(session_type),
            start: NaiveTime::parse_from_str(&start, CLOCK_FORMAT)
                .map_err(|e| conversion_error(4, e))?,
            end: NaiveTime::parse_from_str(&end, CLOCK_FORMAT)
                .map_err(|e| conversion_error(5, e))?,
            duration_hours: row.get(6)?,
            created_at: parse_stamp(&timestamp),
        })
    }
}

/// Format a write stamp with fixed width so text order is time order.
fn format_stamp(stamp: DateTime<Utc>) -> String {
    stamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_stamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn conversion_error(column: usize, err: chrono::ParseError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(err))
}

/// Statistics about the storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageStats {
    /// Total number of sessions stored.
    pub total_sessions: i64,
    /// Write time of the oldest session.
    pub oldest_session: Option<DateTime<Utc>>,
    /// Write time of the newest session.
    pub newest_session: Option<DateTime<Utc>>,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duration::{parse_clock, parse_date};

    fn create_test_storage() -> Storage {
        Storage::open_in_memory().expect("failed to create test storage")
    }

    fn create_test_session(name: &str, start: &str, end: &str) -> Session {
        Session::new(
            name,
            "Biology",
            parse_date("2024-03-11").unwrap(),
            SessionType::Instructional,
            parse_clock(start).unwrap(),
            parse_clock(end).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_open_in_memory() {
        assert!(Storage::open_in_memory().is_ok());
    }

    #[test]
    fn test_insert_and_read_back() {
        let storage = create_test_storage();
        let session = create_test_session("Aragon", "09:00", "10:30");

        let stored = storage.insert(&session, None).unwrap();
        assert!(stored.created_at.is_some());

        let all = storage.all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0], stored);
        assert_eq!(all[0].duration_hours, 1.5);
        assert_eq!(all[0].class_name, "Biology");
    }

    #[test]
    fn test_all_is_newest_first() {
        let storage = create_test_storage();
        for name in ["Aragon", "Morrison", "Howard"] {
            storage
                .insert(&create_test_session(name, "08:00", "09:00"), None)
                .unwrap();
        }

        let names: Vec<_> = storage
            .all()
            .unwrap()
            .into_iter()
            .map(|s| s.instructor_name)
            .collect();
        assert_eq!(names, vec!["Howard", "Morrison", "Aragon"]);
    }

    #[test]
    fn test_stamps_strictly_increase() {
        let storage = create_test_storage();
        let mut previous: Option<DateTime<Utc>> = None;
        for _ in 0..20 {
            let stored = storage
                .insert(&create_test_session("Aragon", "08:00", "09:00"), None)
                .unwrap();
            let stamp = stored.created_at.unwrap();
            if let Some(previous) = previous {
                assert!(stamp > previous);
            }
            previous = Some(stamp);
        }
    }

    #[test]
    fn test_delete_all() {
        let storage = create_test_storage();
        for _ in 0..3 {
            storage
                .insert(&create_test_session("Aragon", "08:00", "09:00"), None)
                .unwrap();
        }

        assert_eq!(storage.delete_all(None).unwrap(), 3);
        assert_eq!(storage.count().unwrap(), 0);
        assert!(storage.all().unwrap().is_empty());
        assert_eq!(storage.delete_all(None).unwrap(), 0);
    }

    #[test]
    fn test_write_times_out_while_another_writer_holds_the_lock() {
        let db_path =
            std::env::temp_dir().join(format!("hourlog_locked_{}.db", std::process::id()));
        let _ = std::fs::remove_file(&db_path);

        let storage = Storage::open(&db_path).unwrap();
        let blocker = Connection::open(&db_path).unwrap();
        blocker.execute_batch("BEGIN IMMEDIATE").unwrap();

        let deadline = Instant::now() + std::time::Duration::from_millis(100);
        let err = storage
            .insert(&create_test_session("Aragon", "08:00", "09:00"), Some(deadline))
            .unwrap_err();
        assert!(matches!(err, Error::Timeout { .. }));

        let deadline = Instant::now() + std::time::Duration::from_millis(100);
        let err = storage.delete_all(Some(deadline)).unwrap_err();
        assert!(matches!(err, Error::Timeout { .. }));

        blocker.execute_batch("COMMIT").unwrap();
        assert_eq!(storage.count().unwrap(), 0);

        // The connection is usable again once the lock is released
        storage
            .insert(&create_test_session("Aragon", "08:00", "09:00"), None)
            .unwrap();
        assert_eq!(storage.count().unwrap(), 1);

        drop(blocker);
        drop(storage);
        let _ = std::fs::remove_file(&db_path);
        let _ = std::fs::remove_file(db_path.with_extension("db-wal"));
        let _ = std::fs::remove_file(db_path.with_extension("db-shm"));
    }

    #[test]
    fn test_expired_deadline_writes_nothing() {
        let storage = create_test_storage();
        let err = storage
            .insert(
                &create_test_session("Howard", "08:00", "09:00"),
                Some(Instant::now()),
            )
            .unwrap_err();
        assert!(matches!(err, Error::Timeout { .. }));
        assert_eq!(storage.count().unwrap(), 0);
    }

    #[test]
    fn test_work_finishing_after_deadline_is_rolled_back() {
        let storage = create_test_storage();
        storage
            .insert(&create_test_session("Howard", "08:00", "09:00"), None)
            .unwrap();

        let deadline = Instant::now() + std::time::Duration::from_millis(20);
        let err = storage
            .immediate("delete all sessions", Some(deadline), |conn| {
                conn.execute("DELETE FROM sessions", [])?;
                std::thread::sleep(std::time::Duration::from_millis(50));
                Ok(())
            })
            .unwrap_err();
        assert!(matches!(err, Error::Timeout { .. }));
        assert_eq!(storage.count().unwrap(), 1);
    }

    #[test]
    fn test_unrecognized_type_round_trips() {
        let storage = create_test_storage();
        let mut session = create_test_session("Aragon", "08:00", "09:00");
        session.session_type = SessionType::Other("break".to_string());
        storage.insert(&session, None).unwrap();

        let all = storage.all().unwrap();
        assert_eq!(all[0].session_type, SessionType::Other("break".to_string()));
    }

    #[test]
    fn test_stats_empty() {
        let stats = create_test_storage().stats().unwrap();
        assert_eq!(stats.total_sessions, 0);
        assert!(stats.oldest_session.is_none());
        assert!(stats.newest_session.is_none());
        assert_eq!(stats.db_size_bytes, 0);
    }

    #[test]
    fn test_stats_with_data() {
        let storage = create_test_storage();
        storage
            .insert(&create_test_session("Aragon", "08:00", "09:00"), None)
            .unwrap();
        storage
            .insert(&create_test_session("Howard", "08:00", "09:00"), None)
            .unwrap();

        let stats = storage.stats().unwrap();
        assert_eq!(stats.total_sessions, 2);
        assert!(stats.oldest_session.unwrap() < stats.newest_session.unwrap());
    }

    #[test]
    fn test_open_file_based_sees_other_connection() {
        let db_path = std::env::temp_dir().join(format!("hourlog_test_{}.db", std::process::id()));

        let writer = Storage::open(&db_path).unwrap();
        let reader = Storage::open(&db_path).unwrap();
        assert_eq!(writer.path(), db_path);

        let before = reader.data_version().unwrap();
        writer
            .insert(&create_test_session("Morrison", "08:00", "09:00"), None)
            .unwrap();
        assert_ne!(reader.data_version().unwrap(), before);
        assert_eq!(reader.count().unwrap(), 1);

        drop(writer);
        drop(reader);
        let _ = std::fs::remove_file(&db_path);
        let _ = std::fs::remove_file(db_path.with_extension("db-wal"));
        let _ = std::fs::remove_file(db_path.with_extension("db-shm"));
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let root = std::env::temp_dir().join(format!("hourlog_test_dirs_{}", std::process::id()));
        let nested_path = root.join("nested/sessions.db");
        let _ = std::fs::remove_dir_all(&root);

        let storage = Storage::open(&nested_path).unwrap();
        assert!(nested_path.exists());

        drop(storage);
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn test_format_stamp_is_fixed_width() {
        let whole = DateTime::parse_from_rfc3339("2024-03-11T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let fractional = whole + Duration::microseconds(1);

        let a = format_stamp(whole);
        let b = format_stamp(fractional);
        assert_eq!(a.len(), b.len());
        assert!(a < b);
        assert_eq!(parse_stamp(&b), Some(fractional));
    }
}
