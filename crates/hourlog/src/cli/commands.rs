//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Subcommand, ValueEnum};

use crate::duration::DATE_FORMAT;
use crate::session::{SessionForm, SessionType};

/// Log command arguments.
#[derive(Debug, Args)]
pub struct LogCommand {
    /// Instructor name
    #[arg(short, long)]
    pub name: String,

    /// Class name
    #[arg(short = 'C', long)]
    pub class: String,

    /// Session date, YYYY-MM-DD (defaults to today)
    #[arg(short, long)]
    pub date: Option<String>,

    /// Session type
    #[arg(short = 't', long = "type", value_enum)]
    pub session_type: SessionTypeArg,

    /// Start time, HH:MM
    #[arg(short, long)]
    pub start: String,

    /// End time, HH:MM
    #[arg(short, long)]
    pub end: String,
}

impl LogCommand {
    /// Turn the arguments into form values, filling in `today` for a missing date.
    #[must_use]
    pub fn to_form(&self, today: NaiveDate) -> SessionForm {
        SessionForm {
            name: self.name.clone(),
            class: self.class.clone(),
            date: self
                .date
                .clone()
                .unwrap_or_else(|| today.format(DATE_FORMAT).to_string()),
            session_type: SessionType::from(self.session_type).to_string(),
            start: self.start.clone(),
            end: self.end.clone(),
        }
    }
}

/// List command arguments.
#[derive(Debug, Args)]
pub struct ListCommand {
    /// Show only the newest N sessions
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Show only sessions by this instructor
    #[arg(short, long)]
    pub instructor: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "plain")]
    pub format: OutputFormat,
}

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Session type argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SessionTypeArg {
    /// Time spent teaching
    Instructional,
    /// Preparation, grading, meetings
    NonInstructional,
}

impl From<SessionTypeArg> for SessionType {
    fn from(arg: SessionTypeArg) -> Self {
        match arg {
            SessionTypeArg::Instructional => Self::Instructional,
            SessionTypeArg::NonInstructional => Self::NonInstructional,
        }
    }
}

/// Output format for commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Plain text output
    #[default]
    Plain,
    /// JSON output
    Json,
}
