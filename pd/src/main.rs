//! Plandeck - interactive project planner
//!
//! CLI entry point: one-shot commands, the line shell and the TUI.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use eyre::{Context, Result};
use tracing::{debug, info, warn};

use planstore::Store;
use plandeck::cli::{Cli, Command, strip_global_args};
use plandeck::config::Config;
use plandeck::history::History;
use plandeck::llm::create_client;
use plandeck::nl::LlmNlService;
use plandeck::services::{NlService, Services};
use plandeck::session::SessionState;
use plandeck::shell::{LineShell, print_error};
use plandeck::tui::{self, App};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("plandeck")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Priority: CLI --log-level > config file > INFO
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(log_dir.join("plandeck.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

/// Natural-language service, or None when disabled or misconfigured
fn build_nl(config: &Config) -> Option<Arc<dyn NlService>> {
    if !config.llm.enabled {
        debug!("build_nl: llm disabled in config");
        return None;
    }
    match create_client(&config.llm) {
        Ok(client) => Some(Arc::new(LlmNlService::new(client, config.llm.max_tokens))),
        Err(e) => {
            warn!(error = %e, "build_nl: natural-language features unavailable");
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    setup_logging(cli.log_level.as_deref(), config.log_level.as_deref()).context("Failed to setup logging")?;

    let store = Store::open(&config.storage.data_dir)
        .context(format!("Failed to open store at {}", config.storage.data_dir.display()))?;
    let services = Services::from_store(store, build_nl(&config));
    let session = SessionState::new(Duration::from_millis(config.shell.cache_ttl_ms));
    let history = History::load(&config.shell.history_file, config.shell.history_size);

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        None | Some(Command::Shell { plain: false }) => {
            debug!("main: launching TUI");
            tui::run(App::new(services, session, history)).await
        }
        Some(Command::Shell { plain: true }) => {
            debug!("main: launching line shell");
            LineShell::new(services, session, history)?.run().await
        }
        Some(_) => {
            let args: Vec<String> = std::env::args().skip(1).collect();
            let mut shell = LineShell::new(services, session, History::ephemeral(0))?;
            if let Err(e) = shell.run_once(strip_global_args(&args)).await {
                print_error(&e);
                std::process::exit(1);
            }
            Ok(())
        }
    }
}
