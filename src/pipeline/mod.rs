//! Pipeline orchestration for boot script runs.
//!
//! # Pipeline Flow
//!
//! 1. **Retrieving**: the characterization listing is fetched and parsed;
//!    any failure here ends the run before a script is touched
//! 2. **Ordering**: units are stably sorted by `execution_order`
//! 3. **Executing**: scripts run one at a time, in order
//! 4. **Reporting**: each outcome is posted from its own task
//! 5. **Collecting**: one delivery result per outcome is drained
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use blueprint_agent::config::AgentConfig;
//! use blueprint_agent::pipeline::{PipelineConfig, PipelineCoordinator};
//! use blueprint_agent::transport::HttpTransport;
//!
//! let agent = AgentConfig::load("./tapp/client.xml")?;
//! let transport = Arc::new(HttpTransport::from_config(&agent)?);
//! let coordinator = PipelineCoordinator::new(PipelineConfig::new(), transport)?;
//!
//! let summary = coordinator.run().await?;
//! for result in &summary.results {
//!     println!("{}", result);
//! }
//! ```

pub mod config;
pub mod coordinator;

pub use config::{PipelineConfig, PipelineConfigError};
pub use coordinator::{PipelineCoordinator, PipelineStage, RunSummary};
