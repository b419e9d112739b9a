//! Error types for blueprint-agent operations.
//!
//! Defines one error enum per subsystem:
//! - Agent configuration loading
//! - Transport (HTTPS client construction and request/response exchange)
//! - Pipeline runs
//!
//! Script failures and delivery failures are deliberately absent: a script
//! that exits non-zero is an ordinary outcome, and a failed delivery is
//! recorded in its `DeliveryResult`.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading the agent configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Missing required setting: {0}")]
    MissingSetting(&'static str),

    #[error("Invalid log level '{0}'")]
    InvalidLogLevel(String),
}

/// Errors that can occur while talking to the blueprint server.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Failed to read TLS material '{path}': {source}")]
    TlsMaterial {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid TLS identity: {0}")]
    InvalidIdentity(String),

    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Server returned {code}: {body}")]
    Status { code: u16, body: String },
}

/// Errors that abort a pipeline run.
///
/// Only retrieval can fail a run; everything after it degrades per unit.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Failed to retrieve script characterizations: {0}")]
    Retrieval(#[from] TransportError),

    #[error("Failed to parse script characterizations: {0}")]
    Parse(#[from] serde_json::Error),
}
