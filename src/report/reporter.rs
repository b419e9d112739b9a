//! Outcome reporter - delivers one script conclusion to the server.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::script::ExecutionOutcome;
use crate::transport::Transport;

/// Timestamp layout the collector parses: microseconds plus a `±HH:MM`
/// offset, e.g. `2014-07-14T11:32:05.123456+02:00`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f%:z";

/// Formats a timestamp with [`TIMESTAMP_FORMAT`].
pub fn format_timestamp<Tz>(timestamp: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

/// Request body for the conclusions endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConclusionEnvelope {
    pub script_conclusion: ScriptConclusion,
}

/// Wire form of an [`ExecutionOutcome`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptConclusion {
    pub script_characterization_id: String,
    pub output: String,
    pub exit_code: i32,
    pub started_at: String,
    pub finished_at: String,
}

impl From<&ExecutionOutcome> for ConclusionEnvelope {
    fn from(outcome: &ExecutionOutcome) -> Self {
        Self {
            script_conclusion: ScriptConclusion {
                script_characterization_id: outcome.identity.clone(),
                output: outcome.output.clone(),
                exit_code: outcome.exit_status,
                started_at: format_timestamp(&outcome.started_at),
                finished_at: format_timestamp(&outcome.finished_at),
            },
        }
    }
}

/// Correlated result of reporting one outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryResult {
    /// Identity of the unit whose outcome was reported.
    pub identity: String,
    /// Whether the server accepted the conclusion.
    pub delivered: bool,
    /// Response status on success, failure text otherwise.
    pub status_text: String,
}

impl DeliveryResult {
    pub fn delivered(identity: impl Into<String>, status_text: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            delivered: true,
            status_text: status_text.into(),
        }
    }

    pub fn failed(identity: impl Into<String>, status_text: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            delivered: false,
            status_text: status_text.into(),
        }
    }
}

impl fmt::Display for DeliveryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.delivered { "delivered" } else { "failed" };
        write!(f, "{} {}: {}", self.identity, state, self.status_text)
    }
}

/// Serializes outcomes and posts them to the conclusions endpoint.
///
/// Cloning is cheap; each delivery task gets its own copy.
#[derive(Clone)]
pub struct OutcomeReporter {
    transport: Arc<dyn Transport>,
    /// Path of the conclusions endpoint, relative to the server base URL.
    conclusions_path: String,
}

impl OutcomeReporter {
    pub fn new(transport: Arc<dyn Transport>, conclusions_path: impl Into<String>) -> Self {
        Self {
            transport,
            conclusions_path: conclusions_path.into(),
        }
    }

    /// Delivers one outcome. Never fails: every problem is captured in the
    /// returned `DeliveryResult`.
    pub async fn report(&self, outcome: &ExecutionOutcome) -> DeliveryResult {
        let body = match encode(outcome) {
            Ok(body) => body,
            Err(e) => {
                warn!(identity = %outcome.identity, error = %e, "Failed to encode conclusion");
                return DeliveryResult::failed(
                    &outcome.identity,
                    format!("serialization failed: {}", e),
                );
            }
        };

        match self.transport.post_json(&self.conclusions_path, body).await {
            Ok(status) => {
                debug!(identity = %outcome.identity, %status, "Conclusion delivered");
                DeliveryResult::delivered(&outcome.identity, status)
            }
            Err(e) => {
                warn!(identity = %outcome.identity, error = %e, "Conclusion delivery failed");
                DeliveryResult::failed(&outcome.identity, e.to_string())
            }
        }
    }
}

/// Encodes an outcome as the JSON conclusion envelope.
pub fn encode(outcome: &ExecutionOutcome) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(&ConclusionEnvelope::from(outcome))
}
