//! Script runner - executes one script body in a fresh subprocess.
//!
//! The body is written to a temporary file and handed to an interpreter.
//! The child's stdout and stderr share a single pipe, so the captured output
//! keeps the interleaving the script produced. Every failure to run is folded
//! into the outcome: the runner never returns an error.
//!
//! Execution is synchronous (`std::process`); the coordinator calls it from
//! `spawn_blocking` so one script is reaped before the next is spawned.

use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::time::Instant;

use chrono::{DateTime, Local};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use super::outcome::ExecutionOutcome;
use super::unit::ExecutionUnit;

/// Exit status reported when the process yielded no status of its own
/// (it could not be started, or a signal ended it). Matches the shell's
/// "command not found" convention.
pub const UNAVAILABLE_EXIT_STATUS: i32 = 127;

/// Interpreter used for scripts without a `#!` line.
pub const DEFAULT_SHELL: &str = "/bin/sh";

/// Returns the exit status of a completed process, or
/// [`UNAVAILABLE_EXIT_STATUS`] when the platform reports none.
pub fn exit_status_code(status: &ExitStatus) -> i32 {
    status.code().unwrap_or(UNAVAILABLE_EXIT_STATUS)
}

/// Runs scripts one at a time. Holds no per-run state, so a single runner
/// can be shared freely.
#[derive(Debug, Clone)]
pub struct ScriptRunner {
    /// Interpreter for bodies that do not name one.
    default_shell: PathBuf,
}

impl Default for ScriptRunner {
    fn default() -> Self {
        Self::new(DEFAULT_SHELL)
    }
}

impl ScriptRunner {
    /// Creates a runner falling back to `default_shell`.
    pub fn new(default_shell: impl Into<PathBuf>) -> Self {
        Self {
            default_shell: default_shell.into(),
        }
    }

    /// Runs the unit's script and tags the outcome with its identity.
    pub fn run_unit(&self, unit: &ExecutionUnit) -> ExecutionOutcome {
        self.run(unit.identity(), unit.script_body())
    }

    /// Runs `body` to completion and captures its outcome.
    pub fn run(&self, identity: impl Into<String>, body: &str) -> ExecutionOutcome {
        let identity = identity.into();

        let script = match write_script(body) {
            Ok(script) => script,
            Err(e) => {
                warn!(identity = %identity, error = %e, "Failed to stage script");
                let now = Local::now();
                return ExecutionOutcome {
                    identity,
                    output: format!("failed to stage script: {}", e),
                    exit_status: UNAVAILABLE_EXIT_STATUS,
                    started_at: now,
                    finished_at: now,
                };
            }
        };

        let command = self.command_for(body, script.path());
        debug!(identity = %identity, command = ?command, "Spawning script");

        let started_at = Local::now();
        let clock = Instant::now();
        let result = capture(command);
        let finished_at = finish_time(started_at, clock);

        // Removes the staged script; also happens on unwind.
        drop(script);

        let (output, exit_status) = match result {
            Ok((output, status)) => (
                String::from_utf8_lossy(&output).into_owned(),
                exit_status_code(&status),
            ),
            Err(e) => {
                warn!(identity = %identity, error = %e, "Failed to run script");
                (format!("failed to run script: {}", e), UNAVAILABLE_EXIT_STATUS)
            }
        };

        ExecutionOutcome {
            identity,
            output,
            exit_status,
            started_at,
            finished_at,
        }
    }

    /// Builds the interpreter invocation for a staged script.
    fn command_for(&self, body: &str, script_path: &Path) -> Command {
        let mut command = match shebang(body) {
            Some((interpreter, arg)) => {
                let mut command = Command::new(interpreter);
                command.args(arg);
                command
            }
            None => Command::new(&self.default_shell),
        };
        command.arg(script_path);
        command
    }
}

/// Splits a leading `#!` line into interpreter and optional single argument,
/// the way the kernel reads it.
fn shebang(body: &str) -> Option<(&str, Option<&str>)> {
    let line = body.strip_prefix("#!")?.lines().next()?.trim();
    match line.split_once(char::is_whitespace) {
        Some((interpreter, arg)) => Some((interpreter, Some(arg.trim()))),
        None if line.is_empty() => None,
        None => Some((line, None)),
    }
}

fn write_script(body: &str) -> io::Result<NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("blueprint-script-")
        .suffix(".sh")
        .tempfile()?;
    file.write_all(body.as_bytes())?;
    file.flush()?;
    Ok(file)
}

/// Spawns `command` with stdout and stderr on one pipe and waits for it.
fn capture(mut command: Command) -> io::Result<(Vec<u8>, ExitStatus)> {
    let (mut reader, writer) = io::pipe()?;
    let writer_err = writer.try_clone()?;

    command
        .stdin(Stdio::null())
        .stdout(writer)
        .stderr(writer_err);
    let mut child = command.spawn()?;
    // The command holds the parent's copies of the write end; without
    // dropping them the read below never sees EOF.
    drop(command);

    let mut output = Vec::new();
    let read = reader.read_to_end(&mut output);
    let status = child.wait()?;
    read?;

    Ok((output, status))
}

/// Finish timestamp from the monotonic clock, so it can never precede the
/// start even if the wall clock steps backwards mid-run.
fn finish_time(started_at: DateTime<Local>, clock: Instant) -> DateTime<Local> {
    chrono::Duration::from_std(clock.elapsed())
        .ok()
        .and_then(|elapsed| started_at.checked_add_signed(elapsed))
        .unwrap_or(started_at)
}
