//! Logging setup for hourlog.
//!
//! Diagnostics go through `tracing` and are written to stderr, so stdout only
//! carries command output such as `--format json`. The level follows the
//! `-q`/`-v` flags unless `RUST_LOG` is set.

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Crate target that the default filter applies to.
const LOG_TARGET: &str = "hourlog";

/// How much the binary logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Errors only (`-q`).
    Quiet,
    /// Info and above.
    #[default]
    Normal,
    /// Debug and above (`-v`).
    Verbose,
    /// Everything (`-vv`).
    Trace,
}

impl Verbosity {
    /// Derive the verbosity from the `-q` flag and the `-v` count.
    ///
    /// `-q` wins over any number of `-v`.
    #[must_use]
    pub fn from_flags(quiet: bool, verbose: u8) -> Self {
        if quiet {
            return Self::Quiet;
        }
        match verbose {
            0 => Self::Normal,
            1 => Self::Verbose,
            _ => Self::Trace,
        }
    }

    /// Most detailed level that is still logged.
    #[must_use]
    pub fn to_level_filter(&self) -> Level {
        match self {
            Self::Quiet => Level::ERROR,
            Self::Normal => Level::INFO,
            Self::Verbose => Level::DEBUG,
            Self::Trace => Level::TRACE,
        }
    }

    /// Filter directive used when `RUST_LOG` is not set, e.g. `hourlog=debug`.
    #[must_use]
    pub fn directive(&self) -> String {
        format!(
            "{LOG_TARGET}={}",
            self.to_level_filter().to_string().to_ascii_lowercase()
        )
    }
}

/// Build the filter: `RUST_LOG` if it parses, otherwise the verbosity directive.
fn env_filter(verbosity: Verbosity) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(verbosity.directive()))
}

/// Install the global subscriber.
///
/// Later calls are ignored, so tests and the binary can both call it.
///
/// # Examples
///
/// ```no_run
/// use hourlog::{init_logging, logging::Verbosity};
///
/// init_logging(Verbosity::from_flags(false, 1));
/// ```
pub fn init_logging(verbosity: Verbosity) {
    let subscriber = tracing_subscriber::registry()
        .with(env_filter(verbosity))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(verbosity != Verbosity::Normal)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false),
        );

    let _ = subscriber.try_init();
}

/// Route warnings from the crate through the test harness's captured output.
#[cfg(test)]
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(format!("{LOG_TARGET}=warn")))
        .with_test_writer()
        .try_init();
}
