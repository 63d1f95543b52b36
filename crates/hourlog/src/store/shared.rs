//! Shared real-time session store backed by `SQLite`.
//!
//! Each `SharedStore` owns one connection. Snapshots are broadcast through a
//! `watch` channel: this store's own writes publish immediately, and a poller
//! task publishes when `PRAGMA data_version` shows that another connection
//! committed.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace, warn};

use super::{SessionStore, SnapshotCallback, StoreStats, Subscription};
use crate::config::Backend;
use crate::error::{Error, Result};
use crate::session::Session;
use crate::storage::Storage;

/// Snapshot shared between the store and its subscribers.
type Snapshot = Arc<Vec<Session>>;

/// A session store that pushes every change to its subscribers.
#[derive(Debug, Clone)]
pub struct SharedStore {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    storage: Mutex<Storage>,
    location: PathBuf,
    changes: watch::Sender<Snapshot>,
    poll_interval: Duration,
    poller: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Ok(mut poller) = self.poller.lock() {
            if let Some(task) = poller.take() {
                task.abort();
            }
        }
    }
}

impl SharedStore {
    /// Open the shared database at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn open(path: impl AsRef<Path>, poll_interval: Duration) -> Result<Self> {
        let storage = Storage::open(path)?;
        Ok(Self::with_storage(storage, poll_interval))
    }

    /// Open a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be created.
    pub fn open_in_memory(poll_interval: Duration) -> Result<Self> {
        let storage = Storage::open_in_memory()?;
        Ok(Self::with_storage(storage, poll_interval))
    }

    fn with_storage(storage: Storage, poll_interval: Duration) -> Self {
        let location = storage.path().to_path_buf();
        let (changes, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            inner: Arc::new(Inner {
                storage: Mutex::new(storage),
                location,
                changes,
                poll_interval,
                poller: Mutex::new(None),
            }),
        }
    }

    /// Run `work` against the connection on the blocking pool.
    async fn with_db<T, F>(&self, work: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Inner, &Storage) -> Result<T> + Send + 'static,
    {
        run_blocking(Arc::clone(&self.inner), work).await
    }

    /// Start watching for remote commits, once per store.
    fn ensure_poller(&self) -> Result<()> {
        let mut poller = self
            .inner
            .poller
            .lock()
            .map_err(|_| Error::internal("poller lock poisoned"))?;
        if poller.is_none() {
            *poller = Some(tokio::spawn(poll_remote_changes(
                Arc::downgrade(&self.inner),
                self.inner.poll_interval,
            )));
            debug!("Watching {} for remote changes", self.inner.location.display());
        }
        Ok(())
    }
}

impl Inner {
    /// Read the collection and hand it to every subscriber.
    ///
    /// Must be called with the storage lock held, so that snapshots are
    /// published in the order they were read.
    fn publish(&self, storage: &Storage) -> Result<()> {
        let sessions = storage.all()?;
        trace!("Publishing {} sessions", sessions.len());
        self.changes.send_if_modified(|current| {
            if current.as_slice() == sessions.as_slice() {
                return false;
            }
            *current = Arc::new(sessions);
            true
        });
        Ok(())
    }

    /// Publish after a committed local write. The write already succeeded, so
    /// a failed read is only logged; the poller catches up on its next tick.
    fn publish_after_write(&self, storage: &Storage) {
        if let Err(err) = self.publish(storage) {
            warn!("Failed to publish sessions after a write: {}", err);
        }
    }
}

async fn run_blocking<T, F>(inner: Arc<Inner>, work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&Inner, &Storage) -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let storage = inner
            .storage
            .lock()
            .map_err(|_| Error::internal("storage lock poisoned"))?;
        work(&inner, &storage)
    })
    .await?
}

/// Publish a fresh snapshot whenever another connection commits.
///
/// Reading and publishing happen under the storage lock, so a remote change
/// can never overwrite a newer snapshot published by a local write. Exits
/// once the store is dropped.
async fn poll_remote_changes(inner: Weak<Inner>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_seen: Option<i64> = None;

    loop {
        ticker.tick().await;
        let Some(inner) = inner.upgrade() else {
            break;
        };

        let seen = last_seen;
        let polled = run_blocking(inner, move |inner, storage| {
            let version = storage.data_version()?;
            if seen != Some(version) {
                inner.publish(storage)?;
            }
            Ok(version)
        })
        .await;

        match polled {
            Ok(version) => {
                if last_seen.is_some_and(|seen| seen != version) {
                    debug!("Remote change detected");
                }
                last_seen = Some(version);
            }
            Err(err) => warn!("Failed to poll for remote changes: {}", err),
        }
    }
}

#[async_trait]
impl SessionStore for SharedStore {
    fn backend(&self) -> Backend {
        Backend::Shared
    }

    fn notifies(&self) -> bool {
        true
    }

    async fn append(&self, session: Session, deadline: Instant) -> Result<Session> {
        self.with_db(move |inner, storage| {
            let stored = storage.insert(&session, Some(deadline))?;
            inner.publish_after_write(storage);
            Ok(stored)
        })
        .await
    }

    async fn snapshot(&self) -> Result<Vec<Session>> {
        self.with_db(|_, storage| storage.all()).await
    }

    async fn delete_all(&self, deadline: Instant) -> Result<usize> {
        self.with_db(move |inner, storage| {
            let removed = storage.delete_all(Some(deadline))?;
            inner.publish_after_write(storage);
            Ok(removed)
        })
        .await
    }

    async fn subscribe(&self, mut callback: SnapshotCallback) -> Result<Subscription> {
        self.ensure_poller()?;
        self.with_db(|inner, storage| inner.publish(storage)).await?;

        let mut changes = self.inner.changes.subscribe();
        let task = tokio::spawn(async move {
            loop {
                let snapshot: Snapshot = Arc::clone(&changes.borrow_and_update());
                callback(&snapshot);
                if changes.changed().await.is_err() {
                    debug!("Store dropped, ending subscription");
                    break;
                }
            }
        });
        Ok(Subscription::from_task(task))
    }

    async fn stats(&self) -> Result<StoreStats> {
        let stats = self.with_db(|_, storage| storage.stats()).await?;
        Ok(StoreStats {
            backend: Backend::Shared,
            location: self.inner.location.clone(),
            total_sessions: usize::try_from(stats.total_sessions).unwrap_or(0),
            oldest_session: stats.oldest_session,
            newest_session: stats.newest_session,
            size_bytes: stats.db_size_bytes,
        })
    }
}
