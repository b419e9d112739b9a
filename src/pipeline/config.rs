//! Pipeline configuration for the coordinator.
//!
//! Endpoint paths and the fallback interpreter live here rather than in
//! process-wide constants, so tests and alternative deployments can point the
//! coordinator elsewhere.

use std::path::PathBuf;

use thiserror::Error;

use crate::script::DEFAULT_SHELL;

/// Errors that can occur while validating a pipeline configuration.
#[derive(Debug, Error)]
pub enum PipelineConfigError {
    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration for one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Path of the characterization listing, relative to the server base URL.
    pub characterizations_path: String,
    /// Characterization type requested from the listing.
    pub script_type: String,
    /// Path of the conclusions endpoint, relative to the server base URL.
    pub conclusions_path: String,
    /// Interpreter for scripts without a `#!` line.
    pub default_shell: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            characterizations_path: "blueprint/script_characterizations".to_string(),
            script_type: "boot".to_string(),
            conclusions_path: "blueprint/script_conclusions".to_string(),
            default_shell: PathBuf::from(DEFAULT_SHELL),
        }
    }
}

impl PipelineConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the characterization type to request.
    pub fn with_script_type(mut self, script_type: impl Into<String>) -> Self {
        self.script_type = script_type.into();
        self
    }

    /// Sets the characterization listing path.
    pub fn with_characterizations_path(mut self, path: impl Into<String>) -> Self {
        self.characterizations_path = path.into();
        self
    }

    /// Sets the conclusions endpoint path.
    pub fn with_conclusions_path(mut self, path: impl Into<String>) -> Self {
        self.conclusions_path = path.into();
        self
    }

    /// Sets the fallback interpreter.
    pub fn with_default_shell(mut self, shell: impl Into<PathBuf>) -> Self {
        self.default_shell = shell.into();
        self
    }

    /// Listing path including the type filter, e.g.
    /// `blueprint/script_characterizations?type=boot`.
    pub fn characterizations_query(&self) -> String {
        format!("{}?type={}", self.characterizations_path, self.script_type)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `PipelineConfigError::ValidationFailed` if any values are invalid.
    pub fn validate(&self) -> Result<(), PipelineConfigError> {
        if self.characterizations_path.trim().is_empty() {
            return Err(PipelineConfigError::ValidationFailed(
                "characterizations_path cannot be empty".to_string(),
            ));
        }

        if self.conclusions_path.trim().is_empty() {
            return Err(PipelineConfigError::ValidationFailed(
                "conclusions_path cannot be empty".to_string(),
            ));
        }

        if self.script_type.is_empty()
            || !self
                .script_type
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(PipelineConfigError::ValidationFailed(format!(
                "script_type '{}' must be non-empty and URL-safe",
                self.script_type
            )));
        }

        if self.default_shell.as_os_str().is_empty() {
            return Err(PipelineConfigError::ValidationFailed(
                "default_shell cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}
