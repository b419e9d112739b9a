//! Execution units and how they run.
//!
//! ```text
//! listing JSON → ExecutionUnit → order_units → ScriptRunner → ExecutionOutcome
//! ```

pub mod ordering;
pub mod outcome;
pub mod runner;
pub mod unit;

pub use ordering::order_units;
pub use outcome::ExecutionOutcome;
pub use runner::{exit_status_code, ScriptRunner, DEFAULT_SHELL, UNAVAILABLE_EXIT_STATUS};
pub use unit::{parse_units, ExecutionUnit};
