//! Session stores.
//!
//! A store persists sessions and hands out the whole collection, newest first.
//! Two backends exist:
//!
//! - [`LocalStore`]: one JSON file on this machine. Writes are visible only to
//!   whoever re-reads the file; subscribers get the initial snapshot and
//!   nothing after it.
//! - [`SharedStore`]: a `SQLite` database that several processes can open.
//!   Subscribers receive a fresh snapshot after every local or remote change.

mod local;
mod shared;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::{Backend, Config};
use crate::error::Result;
use crate::session::Session;

pub use local::LocalStore;
pub use shared::SharedStore;

/// Callback receiving the entire session collection, newest first.
pub type SnapshotCallback = Box<dyn FnMut(&[Session]) + Send + 'static>;

/// Contract shared by every session backend.
#[async_trait]
pub trait SessionStore: Send + Sync + std::fmt::Debug {
    /// Which backend this is.
    fn backend(&self) -> Backend;

    /// Whether subscribers are told about changes after the first snapshot.
    ///
    /// Callers of a store that does not notify must re-read after mutating.
    fn notifies(&self) -> bool;

    /// Persist a session and return it as stored.
    ///
    /// The write is committed only if it completes before `deadline`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Timeout`] once `deadline` has passed, or the
    /// backend's error if the write fails. A failed append leaves no trace.
    async fn append(&self, session: Session, deadline: Instant) -> Result<Session>;

    /// Read every session, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    async fn snapshot(&self) -> Result<Vec<Session>>;

    /// Remove every session, all or nothing, if done before `deadline`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Timeout`] once `deadline` has passed, or an
    /// error if the backend cannot be cleared; nothing is removed in either
    /// case.
    async fn delete_all(&self, deadline: Instant) -> Result<usize>;

    /// Deliver the collection to `callback` now and after every change.
    ///
    /// # Errors
    ///
    /// Returns an error if the initial snapshot cannot be read.
    async fn subscribe(&self, callback: SnapshotCallback) -> Result<Subscription>;

    /// Summary of what the store holds.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    async fn stats(&self) -> Result<StoreStats>;
}

/// A registration made with [`SessionStore::subscribe`].
///
/// Dropping the handle keeps the subscription alive for the life of the
/// process; call [`Subscription::unsubscribe`] to stop deliveries.
#[derive(Debug)]
pub struct Subscription {
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    /// A subscription backed by a delivery task.
    pub(crate) fn from_task(task: JoinHandle<()>) -> Self {
        Self { task: Some(task) }
    }

    /// A subscription that will never deliver again.
    pub(crate) fn finished() -> Self {
        Self { task: None }
    }

    /// Check whether further snapshots may still be delivered.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Stop delivering snapshots.
    pub fn unsubscribe(mut self) {
        if let Some(task) = self.task.take() {
            debug!("Cancelling subscription");
            task.abort();
        }
    }

    /// Wait until the delivery task ends on its own.
    ///
    /// For a notifying store this lasts until the store is dropped.
    pub async fn closed(mut self) {
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

/// What a store currently holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStats {
    /// Backend kind.
    pub backend: Backend,
    /// File backing the store.
    pub location: PathBuf,
    /// Number of sessions.
    pub total_sessions: usize,
    /// Write time of the oldest session, when the backend records one.
    pub oldest_session: Option<DateTime<Utc>>,
    /// Write time of the newest session, when the backend records one.
    pub newest_session: Option<DateTime<Utc>>,
    /// Size of the backing file in bytes.
    pub size_bytes: u64,
}

/// Open the store selected by the configuration.
///
/// # Errors
///
/// Returns an error if the backing file or database cannot be opened.
pub fn open(config: &Config) -> Result<Arc<dyn SessionStore>> {
    let store: Arc<dyn SessionStore> = match config.storage.backend {
        Backend::Local => Arc::new(LocalStore::open(config.local_path())?),
        Backend::Shared => Arc::new(SharedStore::open(
            config.database_path(),
            config.poll_interval(),
        )?),
    };
    debug!("Using {} session store", config.storage.backend);
    Ok(store)
}
