//! Execution units as delivered by the characterization listing.

use serde::Deserialize;

/// One script to run, with its ordering key and identity.
///
/// Units are read-only once deserialized; the runner consumes the body and
/// the identity travels on into the outcome.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExecutionUnit {
    /// Position in the execution sequence. Not unique.
    #[serde(rename = "execution_order")]
    order: i64,
    /// Characterization id, used to correlate the conclusion.
    #[serde(rename = "uuid")]
    identity: String,
    script: ScriptBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
struct ScriptBody {
    code: String,
    /// Only logged; listings without it still parse.
    #[serde(default)]
    uuid: String,
}

impl ExecutionUnit {
    /// Creates a unit directly (mainly for tests and tooling).
    pub fn new(order: i64, identity: impl Into<String>, script_body: impl Into<String>) -> Self {
        Self {
            order,
            identity: identity.into(),
            script: ScriptBody {
                code: script_body.into(),
                uuid: String::new(),
            },
        }
    }

    pub fn order(&self) -> i64 {
        self.order
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn script_body(&self) -> &str {
        &self.script.code
    }

    /// Id of the underlying script definition (shared by characterizations
    /// that reuse the same script).
    pub fn script_identity(&self) -> &str {
        &self.script.uuid
    }
}

/// Parses the JSON array returned by the characterization listing.
pub fn parse_units(body: &[u8]) -> Result<Vec<ExecutionUnit>, serde_json::Error> {
    serde_json::from_slice(body)
}
