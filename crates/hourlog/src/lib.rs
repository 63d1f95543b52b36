//! `hourlog` - Instructor time logging
//!
//! This library records instructional and non-instructional sessions, keeps
//! them in a local or shared session store, and derives per-type and
//! per-instructor hour totals for display.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod aggregate;
pub mod cli;
pub mod config;
pub mod controller;
pub mod duration;
pub mod error;
pub mod logging;
pub mod roster;
pub mod session;
pub mod storage;
pub mod store;
pub mod view;

pub use aggregate::{aggregate, AggregateTotals, InstructorTotals, TypeTotals};
pub use config::{Backend, Config};
pub use controller::{Controller, ControllerState};
pub use error::{Error, Result};
pub use logging::init_logging;
pub use roster::Roster;
pub use session::{Session, SessionForm, SessionType};
pub use storage::{Storage, StorageStats};
pub use store::{LocalStore, SessionStore, SharedStore, Subscription};
pub use view::{Dashboard, TerminalMode, TerminalView, ViewRenderer};
