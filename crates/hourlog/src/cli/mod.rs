//! Command-line interface for hourlog.
//!
//! This module provides the CLI structure for the `hourlog` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    ConfigCommand, ListCommand, LogCommand, OutputFormat, SessionTypeArg, StatusCommand,
};

/// hourlog - Track instructor hours
///
/// Log instructional and non-instructional sessions and see running totals per
/// instructor, either on this machine or through a shared database.
#[derive(Debug, Parser)]
#[command(name = "hourlog")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Log a session
    Log(LogCommand),

    /// List logged sessions, newest first
    List(ListCommand),

    /// Show total hours and the per-instructor breakdown
    Summary {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Delete every logged session
    Clear {
        /// Confirm the deletion
        #[arg(short, long)]
        yes: bool,
    },

    /// Keep the dashboard on screen and redraw it on every change
    Watch,

    /// List the instructors on the roster
    Roster,

    /// Show where sessions are stored and how many there are
    Status(StatusCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        crate::logging::Verbosity::from_flags(self.quiet, self.verbose)
    }
}
