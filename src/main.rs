use std::fs::OpenOptions;
use std::path::Path;

use anyhow::{Context, Result};
use chatterm::app::run_session;
use chatterm::cli::Cli;
use chatterm::config::{
    config_path_for, default_app_dir, load_profiles, resolve_runtime_config,
};
use chatterm::error::{categorize_error, format_cli_error};
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if let Err(err) = run_cli(cli).await {
        eprintln!("{}", format_cli_error(&err));
        tracing::error!(category = %categorize_error(&err).code(), error = %err, "session failed");
        std::process::exit(1);
    }

    Ok(())
}

async fn run_cli(cli: Cli) -> Result<()> {
    let app_dir = default_app_dir();
    let profiles = load_profiles(&config_path_for(&cli, &app_dir))?;
    let cfg = resolve_runtime_config(&cli, &profiles, &app_dir)?;
    init_tracing(&cfg.log_filter, &cfg.log_path)?;
    tracing::info!(
        profile = %cfg.profile,
        history = cfg.history_enabled,
        "Starting chat session"
    );
    run_session(cfg).await
}

/// Logs go to a file; the terminal belongs to the session UI.
fn init_tracing(log_filter: &str, log_path: &Path) -> Result<()> {
    if let Some(parent) = log_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create log directory '{}'", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .with_context(|| format!("failed to open log file '{}'", log_path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(log_filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(std::sync::Mutex::new(file))
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing subscriber: {e}"))
}
