//! CLI definition for blueprint-agent.
//!
//! One invocation performs exactly one pipeline run.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use crate::config::{AgentConfig, DEFAULT_CONFIG_PATH};
use crate::pipeline::{PipelineConfig, PipelineCoordinator};
use crate::transport::HttpTransport;

/// Fallback log filter when neither the CLI nor the config file sets one.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Fetch boot scripts from the blueprint server, run them in order and
/// report each conclusion back.
#[derive(Parser, Debug)]
#[command(name = "blueprint-agent")]
#[command(about = "Run blueprint boot scripts and report their conclusions")]
#[command(version)]
pub struct Cli {
    /// Path to the XML client configuration.
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH, env = "BLUEPRINT_AGENT_CONFIG")]
    pub config: PathBuf,

    /// Log level (trace, debug, info, warn, error). Overrides the config file.
    #[arg(short, long)]
    pub log_level: Option<String>,
}

impl Cli {
    /// Resolves the log filter: `--log-level`, then the config file, then
    /// [`DEFAULT_LOG_LEVEL`]. `RUST_LOG` is honoured by the caller.
    pub fn log_filter(&self, agent: &AgentConfig) -> String {
        self.log_level
            .clone()
            .or_else(|| agent.log_level.clone())
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string())
    }
}

/// Parses command-line arguments.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Loads the agent configuration named on the command line.
pub fn load_config(cli: &Cli) -> anyhow::Result<AgentConfig> {
    AgentConfig::load(&cli.config)
        .with_context(|| format!("loading configuration from {}", cli.config.display()))
}

/// Performs one run against the configured server.
pub async fn run(agent: AgentConfig) -> anyhow::Result<()> {
    let transport = HttpTransport::from_config(&agent).context("building HTTPS client")?;
    info!(endpoint = transport.base_url(), "Connecting to blueprint server");

    let coordinator = PipelineCoordinator::new(PipelineConfig::new(), Arc::new(transport))?;
    let summary = coordinator.run().await?;

    for result in summary.results.iter().filter(|r| !r.delivered) {
        warn!("{}", result);
    }
    info!(
        "Executed {} script(s): {} failed, {} conclusion(s) delivered, {} undelivered",
        summary.units,
        summary.script_failures,
        summary.delivered(),
        summary.delivery_failures()
    );

    Ok(())
}
