//! `hourlog` - CLI for instructor time logging
//!
//! This binary logs sessions, prints totals and the session log, and keeps a
//! live dashboard on screen for the shared backend.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::io::{self, Stdout};
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Local;
use clap::Parser;

use hourlog::cli::{Cli, Command, ConfigCommand, ListCommand, LogCommand, OutputFormat};
use hourlog::store::{self, SessionStore};
use hourlog::view::{format_hours, TerminalMode, TerminalView};
use hourlog::{aggregate, init_logging, Config, Controller, Dashboard, Error, ViewRenderer};

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[tokio::main]
async fn main() -> CliResult {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Configuration commands must work even when the file is broken
    if let Command::Config(config_cmd) = &cli.command {
        return handle_config(cli.config.clone(), config_cmd);
    }

    let config = Config::load_from(cli.config.clone())?;

    match cli.command {
        Command::Log(log_cmd) => handle_log(&config, &log_cmd).await,
        Command::List(list_cmd) => handle_list(&config, &list_cmd).await,
        Command::Summary { json } => handle_summary(&config, json).await,
        Command::Clear { yes } => handle_clear(&config, yes).await,
        Command::Watch => handle_watch(&config).await,
        Command::Roster => {
            handle_roster(&config);
            Ok(())
        }
        Command::Status(status_cmd) => handle_status(&config, status_cmd.json).await,
        Command::Config(_) => Ok(()),
    }
}

fn stdout_controller(
    store: Arc<dyn SessionStore>,
    config: &Config,
    mode: TerminalMode,
) -> Controller<TerminalView<Stdout>> {
    Controller::from_config(store, TerminalView::new(io::stdout(), mode), config)
}

async fn handle_log(config: &Config, cmd: &LogCommand) -> CliResult {
    let store = store::open(config)?;
    let controller = stdout_controller(Arc::clone(&store), config, TerminalMode::SummaryOnly);

    let form = cmd.to_form(Local::now().date_naive());
    let session = controller.log_session(&form).await?;

    // A notifying store redraws through subscribers, and there are none here
    if store.notifies() {
        controller.refresh().await?;
    }
    println!();
    println!(
        "Logged {} hrs of {} time for {}",
        format_hours(session.duration_hours),
        session.session_type.label(),
        session.instructor_name
    );
    Ok(())
}

async fn handle_list(config: &Config, cmd: &ListCommand) -> CliResult {
    let store = store::open(config)?;
    let mut sessions = store.snapshot().await?;
    if let Some(instructor) = &cmd.instructor {
        sessions.retain(|s| &s.instructor_name == instructor);
    }

    match cmd.format {
        OutputFormat::Json => {
            let limit = cmd.limit.unwrap_or(sessions.len());
            sessions.truncate(limit);
            println!("{}", serde_json::to_string_pretty(&sessions)?);
        }
        OutputFormat::Plain => {
            let totals = aggregate(&sessions, &config.roster);
            let mut view =
                TerminalView::new(io::stdout(), TerminalMode::LogOnly).with_log_limit(cmd.limit);
            view.render(&Dashboard::build(&totals, &sessions))?;
        }
    }
    Ok(())
}

async fn handle_summary(config: &Config, json: bool) -> CliResult {
    let mode = if json {
        TerminalMode::Json
    } else {
        TerminalMode::SummaryOnly
    };
    let controller = stdout_controller(store::open(config)?, config, mode);
    controller.refresh().await?;
    Ok(())
}

async fn handle_clear(config: &Config, yes: bool) -> CliResult {
    if !yes {
        println!("This will delete every logged session.");
        println!("Use --yes to confirm.");
        return Ok(());
    }

    let store = store::open(config)?;
    let controller = stdout_controller(store, config, TerminalMode::SummaryOnly);
    let removed = controller.clear_all().await?;
    println!("Deleted {removed} sessions.");
    Ok(())
}

async fn handle_watch(config: &Config) -> CliResult {
    let store = store::open(config)?;
    let view = TerminalView::new(io::stdout(), TerminalMode::Text).clearing_screen();
    let controller = Controller::from_config(Arc::clone(&store), view, config);

    let subscription = controller.attach().await?;
    if !store.notifies() {
        eprintln!(
            "The {} backend does not push changes; showing a single snapshot.",
            store.backend()
        );
        return Ok(());
    }

    tokio::select! {
        result = tokio::signal::ctrl_c() => result?,
        () = subscription.closed() => return Err(Error::SubscriptionClosed.into()),
    }
    Ok(())
}

fn handle_roster(config: &Config) {
    for name in config.roster.names() {
        println!("{name}");
    }
    if config.roster.restrict_to_roster {
        println!();
        println!("Only these instructors may log sessions.");
    }
}

async fn handle_status(config: &Config, json: bool) -> CliResult {
    let store = store::open(config)?;
    let stats = store.stats().await?;

    if json {
        let status = serde_json::json!({
            "backend": stats.backend,
            "location": stats.location,
            "total_sessions": stats.total_sessions,
            "oldest_session": stats.oldest_session,
            "newest_session": stats.newest_session,
            "size_bytes": stats.size_bytes,
            "live_updates": store.notifies(),
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("hourlog status");
        println!("--------------");
        println!("Backend:       {}", stats.backend);
        println!("Location:      {}", stats.location.display());
        println!("Sessions:      {}", stats.total_sessions);
        if let Some(oldest) = stats.oldest_session {
            println!("First write:   {}", oldest.to_rfc3339());
        }
        if let Some(newest) = stats.newest_session {
            println!("Last write:    {}", newest.to_rfc3339());
        }
        println!("Size:          {} bytes", stats.size_bytes);
        println!(
            "Live updates:  {}",
            if store.notifies() { "yes" } else { "no" }
        );
    }
    Ok(())
}

fn handle_config(path: Option<PathBuf>, cmd: &ConfigCommand) -> CliResult {
    match cmd {
        ConfigCommand::Show { json } => {
            let config = Config::load_from(path)?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Backend:            {}", config.storage.backend);
                println!("  Location:           {}", config.store_path().display());
                println!("  Write timeout (ms): {}", config.storage.write_timeout_ms);
                println!("  Poll interval (ms): {}", config.storage.poll_interval_ms);
                println!();
                println!("[Roster]");
                println!(
                    "  Instructors:        {}",
                    config.roster.names().collect::<Vec<_>>().join(", ")
                );
                println!(
                    "  Restrict to roster: {}",
                    config.roster.restrict_to_roster
                );
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file
                .clone()
                .or(path)
                .unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
