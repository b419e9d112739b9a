//! Command-line interface for blueprint-agent.

mod commands;

pub use commands::{load_config, parse_cli, run, Cli, DEFAULT_LOG_LEVEL};
