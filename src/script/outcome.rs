//! Captured result of running one execution unit.

use chrono::{DateTime, Local};

/// What happened when a unit's script ran.
///
/// Built once by the runner and never modified; the reporter reads it to
/// build the conclusion envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutcome {
    /// Identity of the unit that produced this outcome.
    pub identity: String,
    /// Interleaved stdout and stderr, lossily decoded as UTF-8.
    pub output: String,
    /// Process exit status; `127` when no real status was available.
    pub exit_status: i32,
    /// Taken immediately before the process was spawned.
    pub started_at: DateTime<Local>,
    /// Taken immediately after the process was reaped.
    pub finished_at: DateTime<Local>,
}

impl ExecutionOutcome {
    /// Returns true if the script exited with status 0.
    pub fn is_success(&self) -> bool {
        self.exit_status == 0
    }

    /// Wall-clock time between spawn and reap.
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}
