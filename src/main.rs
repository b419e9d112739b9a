//! blueprint-agent entry point.
//!
//! Loads the client configuration, initializes logging and performs one run.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use anyhow::Context;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = blueprint_agent::cli::parse_cli();

    // Logging is configured from the file, so it must load first.
    let agent = blueprint_agent::cli::load_config(&cli)?;

    // Priority: RUST_LOG env var > --log-level CLI arg > config file > "info"
    let log_filter = cli.log_filter(&agent);
    init_tracing(&log_filter, agent.log_file.as_deref())?;

    blueprint_agent::cli::run(agent).await
}

fn init_tracing(log_filter: &str, log_file: Option<&Path>) -> anyhow::Result<()> {
    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {}", path.display()))?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_filter)))
        .with(fmt::layer())
        .with(file_layer)
        .init();

    Ok(())
}
