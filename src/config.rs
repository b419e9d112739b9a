//! Agent configuration loaded from the XML client file.
//!
//! The file carries the blueprint server address, logging preferences and
//! the TLS material used to authenticate the agent:
//!
//! ```xml
//! <tapp server="https://blueprint.example.com/" log_file="/var/log/agent.log" log_level="info">
//!   <ssl cert="/etc/agent/client.pem" key="/etc/agent/client.key" server_ca="/etc/agent/ca.pem"/>
//! </tapp>
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use crate::error::ConfigError;

/// Default location of the client configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "./tapp/client.xml";

/// Settings the agent needs to reach and authenticate against the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    /// Base URL of the blueprint server.
    pub endpoint: String,
    /// Optional file that receives a copy of the log output.
    pub log_file: Option<PathBuf>,
    /// Default log filter (e.g. "info", "debug").
    pub log_level: Option<String>,
    /// Client certificate, key and optional server CA.
    pub tls: TlsMaterial,
}

/// Paths to the PEM files that make up the client's TLS identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsMaterial {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
    /// Extra root certificate for the server, if it is not publicly trusted.
    pub server_ca_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(rename = "@server", default)]
    server: Option<String>,
    #[serde(rename = "@log_file", default)]
    log_file: Option<String>,
    #[serde(rename = "@log_level", default)]
    log_level: Option<String>,
    #[serde(default)]
    ssl: Option<RawSsl>,
}

#[derive(Debug, Deserialize)]
struct RawSsl {
    #[serde(rename = "@cert", default)]
    cert: Option<String>,
    #[serde(rename = "@key", default)]
    key: Option<String>,
    #[serde(rename = "@server_ca", default)]
    server_ca: Option<String>,
}

impl AgentConfig {
    /// Reads and validates the configuration file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_xml(&text, path)
    }

    /// Parses configuration from XML text. `origin` is only used in errors.
    pub fn from_xml(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        let raw: RawConfig = quick_xml::de::from_str(text).map_err(|e| ConfigError::Parse {
            path: origin.to_path_buf(),
            message: e.to_string(),
        })?;

        let endpoint = non_empty(raw.server).ok_or(ConfigError::MissingSetting("tapp@server"))?;
        let ssl = raw.ssl.ok_or(ConfigError::MissingSetting("tapp/ssl"))?;
        let cert_path = non_empty(ssl.cert).ok_or(ConfigError::MissingSetting("ssl@cert"))?;
        let key_path = non_empty(ssl.key).ok_or(ConfigError::MissingSetting("ssl@key"))?;

        let log_level = non_empty(raw.log_level);
        if let Some(ref level) = log_level {
            EnvFilter::try_new(level).map_err(|_| ConfigError::InvalidLogLevel(level.clone()))?;
        }

        Ok(Self {
            endpoint,
            log_file: non_empty(raw.log_file).map(PathBuf::from),
            log_level,
            tls: TlsMaterial {
                cert_path: PathBuf::from(cert_path),
                key_path: PathBuf::from(key_path),
                server_ca_path: non_empty(ssl.server_ca).map(PathBuf::from),
            },
        })
    }
}

/// Treats absent and blank attributes the same way.
fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
