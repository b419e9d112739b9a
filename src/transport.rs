//! HTTPS transport to the blueprint server.
//!
//! The pipeline only sees the [`Transport`] trait: one GET for retrieval and
//! one JSON POST per delivery. [`HttpTransport`] implements it on top of a
//! `reqwest` client authenticated with the agent's client certificate.

use std::fs;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Certificate, Client, Identity};
use tracing::debug;

use crate::config::{AgentConfig, TlsMaterial};
use crate::error::TransportError;

/// Longest slice of an error response body kept in a `TransportError`.
const MAX_ERROR_BODY: usize = 512;

/// Request timeout for every exchange with the server.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Request/response exchange with the blueprint server.
///
/// Implementations must be safe to share between concurrent delivery tasks.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issues a GET for `path` (relative to the server base URL) and returns
    /// the body of a successful response.
    async fn get(&self, path: &str) -> Result<Vec<u8>, TransportError>;

    /// POSTs a JSON `body` to `path` and returns the response status line,
    /// e.g. `"201 Created"`.
    async fn post_json(&self, path: &str, body: Vec<u8>) -> Result<String, TransportError>;
}

/// `Transport` backed by a mutually authenticated `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    /// Base URL of the server.
    base_url: String,
    /// Pooled HTTP client; cheap to clone and safe to share.
    client: Client,
}

impl HttpTransport {
    /// Creates a transport from an already built client.
    pub fn new(base_url: impl Into<String>, client: Client) -> Self {
        Self {
            base_url: base_url.into(),
            client,
        }
    }

    /// Builds the authenticated client described by the agent configuration.
    pub fn from_config(config: &AgentConfig) -> Result<Self, TransportError> {
        let client = build_client(&config.tls)?;
        Ok(Self::new(config.endpoint.clone(), client))
    }

    /// Returns the server base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, path: &str) -> Result<Vec<u8>, TransportError> {
        let url = join_url(&self.base_url, path);
        debug!(%url, "GET");

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| TransportError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                code: status.as_u16(),
                body: truncate(body),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| TransportError::RequestFailed(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    async fn post_json(&self, path: &str, body: Vec<u8>) -> Result<String, TransportError> {
        let url = join_url(&self.base_url, path);
        debug!(%url, bytes = body.len(), "POST");

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| TransportError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                code: status.as_u16(),
                body: truncate(body),
            });
        }

        Ok(status.to_string())
    }
}

/// Builds a `reqwest` client presenting the configured client certificate.
pub fn build_client(tls: &TlsMaterial) -> Result<Client, TransportError> {
    let mut pem = read_pem(&tls.cert_path)?;
    pem.push(b'\n');
    pem.extend(read_pem(&tls.key_path)?);

    let identity =
        Identity::from_pem(&pem).map_err(|e| TransportError::InvalidIdentity(e.to_string()))?;

    let mut builder = Client::builder().identity(identity).timeout(REQUEST_TIMEOUT);

    if let Some(ref ca_path) = tls.server_ca_path {
        let ca = Certificate::from_pem(&read_pem(ca_path)?)
            .map_err(|e| TransportError::InvalidIdentity(e.to_string()))?;
        builder = builder.add_root_certificate(ca);
    }

    builder
        .build()
        .map_err(|e| TransportError::ClientBuild(e.to_string()))
}

fn read_pem(path: &Path) -> Result<Vec<u8>, TransportError> {
    fs::read(path).map_err(|source| TransportError::TlsMaterial {
        path: path.to_path_buf(),
        source,
    })
}

/// Joins a base URL and a relative path with exactly one `/` between them.
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Caps `body` at [`MAX_ERROR_BODY`] bytes, cutting on a char boundary.
fn truncate(mut body: String) -> String {
    if body.len() <= MAX_ERROR_BODY {
        return body;
    }
    let cut = body
        .char_indices()
        .map(|(i, _)| i)
        .take_while(|&i| i <= MAX_ERROR_BODY)
        .last()
        .unwrap_or(0);
    body.truncate(cut);
    body.push_str("... [truncated]");
    body
}
