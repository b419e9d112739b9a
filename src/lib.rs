//! blueprint-agent: run boot scripts handed out by a blueprint server.
//!
//! The agent retrieves the script characterizations assigned to this host,
//! executes them one by one in their declared order, and reports each
//! script's conclusion (output, exit code, timestamps) back to the server.

pub mod cli;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod report;
pub mod script;
pub mod transport;

// Re-export commonly used error types
pub use error::{ConfigError, PipelineError, TransportError};
