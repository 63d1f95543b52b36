//! Orchestration between the form, the session store and the view.
//!
//! The controller is either [`ControllerState::Idle`] or
//! [`ControllerState::Submitting`]. Writes only start from Idle and always
//! return to it, whether they succeed, fail or time out. Every time the
//! session collection changes the totals are recomputed from scratch and the
//! view is redrawn.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::aggregate::{aggregate, AggregateTotals};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::roster::Roster;
use crate::session::{Session, SessionForm};
use crate::store::{SessionStore, SnapshotCallback, Subscription};
use crate::view::{Dashboard, ViewRenderer};

/// Whether a write is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// Waiting for input or a store notification.
    Idle,
    /// An append or delete-all is in flight.
    Submitting,
}

/// Holds the controller in Submitting until dropped.
struct SubmitGuard<'a>(&'a AtomicBool);

impl<'a> SubmitGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::SubmitInProgress)?;
        Ok(Self(flag))
    }
}

impl Drop for SubmitGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Drives a [`SessionStore`] and a [`ViewRenderer`].
///
/// Clones share the store, the view and the Submitting state.
#[derive(Debug)]
pub struct Controller<V: ViewRenderer> {
    store: Arc<dyn SessionStore>,
    view: Arc<Mutex<V>>,
    roster: Arc<Roster>,
    submitting: Arc<AtomicBool>,
    write_timeout: Duration,
}

impl<V: ViewRenderer> Clone for Controller<V> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            view: Arc::clone(&self.view),
            roster: Arc::clone(&self.roster),
            submitting: Arc::clone(&self.submitting),
            write_timeout: self.write_timeout,
        }
    }
}

impl<V: ViewRenderer> Controller<V> {
    /// Create a controller.
    pub fn new(
        store: Arc<dyn SessionStore>,
        view: V,
        roster: Roster,
        write_timeout: Duration,
    ) -> Self {
        Self {
            store,
            view: Arc::new(Mutex::new(view)),
            roster: Arc::new(roster),
            submitting: Arc::new(AtomicBool::new(false)),
            write_timeout,
        }
    }

    /// Create a controller using the roster and write timeout from `config`.
    pub fn from_config(store: Arc<dyn SessionStore>, view: V, config: &Config) -> Self {
        Self::new(store, view, config.roster.clone(), config.write_timeout())
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ControllerState {
        if self.submitting.load(Ordering::Acquire) {
            ControllerState::Submitting
        } else {
            ControllerState::Idle
        }
    }

    /// The roster used for totals and form validation.
    #[must_use]
    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// The store this controller writes to.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Run `f` with the view.
    ///
    /// # Errors
    ///
    /// Returns an error if the view lock is poisoned.
    pub fn with_view<R>(&self, f: impl FnOnce(&mut V) -> R) -> Result<R> {
        Ok(f(&mut *self.lock_view()?))
    }

    /// Validate the form and append the session it describes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SubmitInProgress`] if another write is in flight, a
    /// validation error for a bad form, [`Error::Timeout`] if the store could
    /// not commit before the write timeout (nothing is stored then), or the
    /// store's own error. The message is also shown in the view.
    pub async fn log_session(&self, form: &SessionForm) -> Result<Session> {
        let stored = self.report(self.submit(form).await)?;
        info!(
            "Logged {:.2} {} hours for {}",
            stored.duration_hours, stored.session_type, stored.instructor_name
        );
        if !self.store.notifies() {
            self.refresh().await?;
        }
        Ok(stored)
    }

    async fn submit(&self, form: &SessionForm) -> Result<Session> {
        let _guard = SubmitGuard::acquire(&self.submitting)?;
        let session = form.validate(&self.roster)?;
        self.store.append(session, self.deadline()).await
    }

    /// Delete every session and redraw.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Controller::log_session`], minus validation.
    pub async fn clear_all(&self) -> Result<usize> {
        let removed = self.report(self.clear().await)?;
        info!("Cleared {} sessions", removed);
        if !self.store.notifies() {
            self.refresh().await?;
        }
        Ok(removed)
    }

    async fn clear(&self) -> Result<usize> {
        let _guard = SubmitGuard::acquire(&self.submitting)?;
        self.store.delete_all(self.deadline()).await
    }

    /// Latest instant a write started now may commit.
    fn deadline(&self) -> Instant {
        Instant::now() + self.write_timeout
    }

    /// Fetch every session, recompute the totals and redraw.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or the view cannot draw.
    pub async fn refresh(&self) -> Result<AggregateTotals> {
        let sessions = self.store.snapshot().await.map_err(|err| {
            self.show_error(&err);
            err
        })?;
        let totals = aggregate(&sessions, &self.roster);
        self.lock_view()?
            .render(&Dashboard::build(&totals, &sessions))?;
        Ok(totals)
    }

    /// Redraw the view on every snapshot the store delivers.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot deliver the first snapshot.
    pub async fn attach(&self) -> Result<Subscription> {
        let view = Arc::clone(&self.view);
        let roster = Arc::clone(&self.roster);
        let callback: SnapshotCallback = Box::new(move |sessions: &[Session]| {
            let totals = aggregate(sessions, &roster);
            let dashboard = Dashboard::build(&totals, sessions);
            match view.lock() {
                Ok(mut view) => {
                    if let Err(err) = view.render(&dashboard) {
                        warn!("Failed to render dashboard: {}", err);
                    }
                }
                Err(_) => warn!("View lock poisoned, dropping snapshot"),
            }
        });

        let subscription = self
            .store
            .subscribe(callback)
            .await
            .map_err(|err| {
                self.show_error(&err);
                err
            })?;
        debug!("Attached to {} store", self.store.backend());
        Ok(subscription)
    }

    /// Mirror the outcome of a user action in the view's error region.
    fn report<T>(&self, result: Result<T>) -> Result<T> {
        match &result {
            Ok(_) => {
                if let Ok(mut view) = self.lock_view() {
                    view.clear_error();
                }
            }
            Err(err) => self.show_error(err),
        }
        result
    }

    fn show_error(&self, err: &Error) {
        if err.is_validation_error() {
            debug!("Rejected form: {}", err);
        } else {
            warn!("{}", err);
        }
        match self.lock_view() {
            Ok(mut view) => view.show_error(&err.to_string()),
            Err(_) => warn!("View lock poisoned, error not shown"),
        }
    }

    fn lock_view(&self) -> Result<MutexGuard<'_, V>> {
        self.view
            .lock()
            .map_err(|_| Error::internal("view lock poisoned"))
    }
}
