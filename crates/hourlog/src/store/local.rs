//! Local-only session store: one JSON array in one file.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, info};

use super::{SessionStore, SnapshotCallback, StoreStats, Subscription};
use crate::config::Backend;
use crate::error::{Error, Result};
use crate::session::Session;

/// Sessions kept in a JSON file, oldest first on disk.
///
/// The file is re-read for every operation, so two processes sharing it see
/// each other's writes the next time they read. Nothing is pushed to
/// subscribers after their first snapshot.
#[derive(Debug, Clone)]
pub struct LocalStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process
    lock: Arc<Mutex<()>>,
}

impl LocalStore {
    /// Open the store, creating the file with an empty log if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        if !path.exists() {
            write_sessions(&path, &[], None)?;
            info!("Created session log at {}", path.display());
        }

        Ok(Self {
            path,
            lock: Arc::new(Mutex::new(())),
        })
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `work` while holding the in-process lock, off the async runtime.
    async fn locked<T, F>(&self, work: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Path) -> Result<T> + Send + 'static,
    {
        let path = self.path.clone();
        let lock = Arc::clone(&self.lock);
        tokio::task::spawn_blocking(move || {
            let _guard = lock
                .lock()
                .map_err(|_| Error::internal("local store lock poisoned"))?;
            work(&path)
        })
        .await?
    }
}

#[async_trait]
impl SessionStore for LocalStore {
    fn backend(&self) -> Backend {
        Backend::Local
    }

    fn notifies(&self) -> bool {
        false
    }

    async fn append(&self, session: Session, deadline: Instant) -> Result<Session> {
        self.locked(move |path| {
            let mut sessions = read_sessions(path)?;
            sessions.push(session.clone());
            write_sessions(path, &sessions, Some(deadline))?;
            debug!("Appended session for {}", session.instructor_name);
            Ok(session)
        })
        .await
    }

    async fn snapshot(&self) -> Result<Vec<Session>> {
        self.locked(|path| {
            let mut sessions = read_sessions(path)?;
            sessions.reverse();
            Ok(sessions)
        })
        .await
    }

    async fn delete_all(&self, deadline: Instant) -> Result<usize> {
        self.locked(move |path| {
            let removed = read_sessions(path)?.len();
            write_sessions(path, &[], Some(deadline))?;
            info!("Cleared {} sessions from {}", removed, path.display());
            Ok(removed)
        })
        .await
    }

    async fn subscribe(&self, mut callback: SnapshotCallback) -> Result<Subscription> {
        let sessions = self.snapshot().await?;
        callback(&sessions);
        Ok(Subscription::finished())
    }

    async fn stats(&self) -> Result<StoreStats> {
        let total_sessions = self.snapshot().await?.len();
        let size_bytes = fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0);
        Ok(StoreStats {
            backend: Backend::Local,
            location: self.path.clone(),
            total_sessions,
            oldest_session: None,
            newest_session: None,
            size_bytes,
        })
    }
}

/// Read the log; an empty file counts as an empty log.
fn read_sessions(path: &Path) -> Result<Vec<Session>> {
    if fs::metadata(path)?.len() == 0 {
        return Ok(Vec::new());
    }
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

/// Replace the log through a temporary file so readers never see half a write.
///
/// The rename is the commit point. If `deadline` has passed by then, the
/// staged file is discarded and the log is left as it was.
fn write_sessions(path: &Path, sessions: &[Session], deadline: Option<Instant>) -> Result<()> {
    let staging = path.with_extension("json.tmp");
    {
        let mut writer = BufWriter::new(File::create(&staging)?);
        serde_json::to_writer_pretty(&mut writer, sessions)?;
        writer.flush()?;
    }
    if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
        let _ = fs::remove_file(&staging);
        return Err(Error::timeout(format!("write {}", path.display())));
    }
    fs::rename(&staging, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duration::{parse_clock, parse_date};
    use crate::session::SessionType;

    fn temp_path(tag: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("hourlog_local_{}_{tag}", std::process::id()))
            .join("sessions.json")
    }

    fn cleanup(path: &Path) {
        if let Some(parent) = path.parent() {
            let _ = fs::remove_dir_all(parent);
        }
    }

    fn deadline() -> Instant {
        Instant::now() + std::time::Duration::from_secs(5)
    }

    fn session(name: &str) -> Session {
        Session::new(
            name,
            "Chemistry",
            parse_date("2024-04-02").unwrap(),
            SessionType::NonInstructional,
            parse_clock("14:00").unwrap(),
            parse_clock("14:45").unwrap(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_open_creates_empty_log() {
        let path = temp_path("create");
        cleanup(&path);

        let store = LocalStore::open(&path).unwrap();
        assert!(path.exists());
        assert!(store.snapshot().await.unwrap().is_empty());
        assert_eq!(fs::read_to_string(&path).unwrap().trim(), "[]");

        cleanup(&path);
    }

    #[tokio::test]
    async fn test_append_and_snapshot_newest_first() {
        let path = temp_path("append");
        cleanup(&path);
        let store = LocalStore::open(&path).unwrap();

        for name in ["Aragon", "Morrison", "Howard"] {
            let stored = store.append(session(name), deadline()).await.unwrap();
            assert!(stored.created_at.is_none());
        }

        let names: Vec<_> = store
            .snapshot()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.instructor_name)
            .collect();
        assert_eq!(names, vec!["Howard", "Morrison", "Aragon"]);

        cleanup(&path);
    }

    #[tokio::test]
    async fn test_log_survives_reopen() {
        let path = temp_path("reopen");
        cleanup(&path);

        LocalStore::open(&path)
            .unwrap()
            .append(session("Aragon"), deadline())
            .await
            .unwrap();

        let reopened = LocalStore::open(&path).unwrap();
        let sessions = reopened.snapshot().await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].duration_hours, 0.75);

        cleanup(&path);
    }

    #[tokio::test]
    async fn test_delete_all() {
        let path = temp_path("clear");
        cleanup(&path);
        let store = LocalStore::open(&path).unwrap();
        store.append(session("Aragon"), deadline()).await.unwrap();
        store.append(session("Howard"), deadline()).await.unwrap();

        assert_eq!(store.delete_all(deadline()).await.unwrap(), 2);
        assert!(store.snapshot().await.unwrap().is_empty());

        cleanup(&path);
    }

    #[tokio::test]
    async fn test_expired_deadline_leaves_log_unchanged() {
        let path = temp_path("deadline");
        cleanup(&path);
        let store = LocalStore::open(&path).unwrap();
        store.append(session("Aragon"), deadline()).await.unwrap();

        let err = store
            .append(session("Howard"), Instant::now())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout { .. }));
        let err = store.delete_all(Instant::now()).await.unwrap_err();
        assert!(matches!(err, Error::Timeout { .. }));

        let sessions = store.snapshot().await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].instructor_name, "Aragon");
        assert!(!path.with_extension("json.tmp").exists());

        cleanup(&path);
    }

    #[tokio::test]
    async fn test_subscribe_delivers_once() {
        let path = temp_path("subscribe");
        cleanup(&path);
        let store = LocalStore::open(&path).unwrap();
        store.append(session("Aragon"), deadline()).await.unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let subscription = store
            .subscribe(Box::new(move |sessions: &[Session]| {
                sink.lock().unwrap().push(sessions.len());
            }))
            .await
            .unwrap();

        store.append(session("Howard"), deadline()).await.unwrap();
        assert!(!subscription.is_active());
        assert_eq!(*seen.lock().unwrap(), vec![1]);

        cleanup(&path);
    }

    #[tokio::test]
    async fn test_reads_legacy_records() {
        let path = temp_path("legacy");
        cleanup(&path);
        let store = LocalStore::open(&path).unwrap();
        fs::write(
            &path,
            r#"[{"name":"Howard","date":"2024-01-05","type":"instructional",
                 "start":"09:00","end":"10:00","duration":1}]"#,
        )
        .unwrap();

        let sessions = store.snapshot().await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].class_name, "");
        assert_eq!(sessions[0].duration_hours, 1.0);

        cleanup(&path);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_backend_error() {
        let path = temp_path("corrupt");
        cleanup(&path);
        let store = LocalStore::open(&path).unwrap();
        fs::write(&path, "{ not json").unwrap();

        let err = store.snapshot().await.unwrap_err();
        assert!(matches!(err, Error::Json(_)));
        assert!(err.is_backend_error());

        cleanup(&path);
    }

    #[tokio::test]
    async fn test_stats() {
        let path = temp_path("stats");
        cleanup(&path);
        let store = LocalStore::open(&path).unwrap();
        store.append(session("Aragon"), deadline()).await.unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.backend, Backend::Local);
        assert_eq!(stats.total_sessions, 1);
        assert_eq!(stats.location, path);
        assert!(stats.size_bytes > 0);

        cleanup(&path);
    }
}
