//! Pipeline coordinator - one run from retrieval to collected deliveries.
//!
//! Stages run strictly in order:
//!
//! ```text
//! Retrieving → Ordering → Executing → Reporting → Collecting → Done
//! ```
//!
//! Scripts execute one after another on the blocking pool. Once every
//! outcome is buffered, each is reported from its own task and the results
//! are funnelled back through a channel sized to the outcome count.

use std::fmt;
use std::sync::Arc;

use chrono::Local;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::PipelineError;
use crate::report::{DeliveryResult, OutcomeReporter};
use crate::script::{
    order_units, parse_units, ExecutionOutcome, ExecutionUnit, ScriptRunner,
    UNAVAILABLE_EXIT_STATUS,
};
use crate::transport::Transport;

use super::config::{PipelineConfig, PipelineConfigError};

/// Stage of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Retrieving,
    Ordering,
    Executing,
    Reporting,
    Collecting,
    Done,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineStage::Retrieving => write!(f, "retrieving"),
            PipelineStage::Ordering => write!(f, "ordering"),
            PipelineStage::Executing => write!(f, "executing"),
            PipelineStage::Reporting => write!(f, "reporting"),
            PipelineStage::Collecting => write!(f, "collecting"),
            PipelineStage::Done => write!(f, "done"),
        }
    }
}

/// Aggregate view of a finished run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Unique identifier for this run.
    pub run_id: String,
    /// Number of units retrieved (and therefore executed).
    pub units: usize,
    /// Scripts that exited with a non-zero status.
    pub script_failures: usize,
    /// Delivery results in arrival order.
    pub results: Vec<DeliveryResult>,
}

impl RunSummary {
    /// Number of conclusions the server accepted.
    pub fn delivered(&self) -> usize {
        self.results.iter().filter(|r| r.delivered).count()
    }

    /// Number of conclusions that could not be delivered.
    pub fn delivery_failures(&self) -> usize {
        self.results.len() - self.delivered()
    }

    /// Returns true if every script succeeded and every conclusion landed.
    pub fn is_clean(&self) -> bool {
        self.script_failures == 0 && self.delivery_failures() == 0
    }
}

/// In-flight deliveries awaiting collection.
struct Dispatch {
    expected: usize,
    results: mpsc::Receiver<DeliveryResult>,
    tasks: Vec<(String, JoinHandle<()>)>,
}

/// Drives retrieval, ordering, execution and reporting for one run.
pub struct PipelineCoordinator {
    config: PipelineConfig,
    transport: Arc<dyn Transport>,
    runner: ScriptRunner,
    reporter: OutcomeReporter,
}

impl PipelineCoordinator {
    /// Creates a coordinator talking to the server through `transport`.
    pub fn new(
        config: PipelineConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, PipelineConfigError> {
        config.validate()?;
        let runner = ScriptRunner::new(config.default_shell.clone());
        let reporter = OutcomeReporter::new(Arc::clone(&transport), config.conclusions_path.clone());
        Ok(Self {
            config,
            transport,
            runner,
            reporter,
        })
    }

    /// Performs one complete run.
    ///
    /// # Errors
    ///
    /// Only retrieval can fail the run; in that case no script is executed.
    pub async fn run(&self) -> Result<RunSummary, PipelineError> {
        let run_id = format!("run-{}", Uuid::new_v4());

        enter(&run_id, PipelineStage::Retrieving);
        let units = self.retrieve().await?;
        let total = units.len();

        enter(&run_id, PipelineStage::Ordering);
        let units = order_units(units);

        enter(&run_id, PipelineStage::Executing);
        let outcomes = self.execute_all(units).await;
        let script_failures = outcomes.iter().filter(|o| !o.is_success()).count();

        enter(&run_id, PipelineStage::Reporting);
        let dispatch = self.dispatch(outcomes);

        enter(&run_id, PipelineStage::Collecting);
        let results = collect(dispatch).await;

        enter(&run_id, PipelineStage::Done);
        let summary = RunSummary {
            run_id,
            units: total,
            script_failures,
            results,
        };
        info!(
            run_id = %summary.run_id,
            units = summary.units,
            script_failures = summary.script_failures,
            delivered = summary.delivered(),
            delivery_failures = summary.delivery_failures(),
            "Run finished"
        );
        Ok(summary)
    }

    /// Fetches and parses the characterization listing.
    pub async fn retrieve(&self) -> Result<Vec<ExecutionUnit>, PipelineError> {
        let body = self
            .transport
            .get(&self.config.characterizations_query())
            .await?;
        let units = parse_units(&body)?;
        info!(count = units.len(), "Retrieved script characterizations");
        Ok(units)
    }

    /// Runs every unit in the given order, one at a time.
    ///
    /// Each script is reaped before the next one is spawned.
    pub async fn execute_all(&self, units: Vec<ExecutionUnit>) -> Vec<ExecutionOutcome> {
        let mut outcomes = Vec::with_capacity(units.len());

        for unit in units {
            let identity = unit.identity().to_string();
            info!(
                identity = %identity,
                order = unit.order(),
                script = unit.script_identity(),
                "Executing script"
            );
            debug!(identity = %identity, body = unit.script_body(), "Script body");

            let runner = self.runner.clone();
            let outcome = match tokio::task::spawn_blocking(move || runner.run_unit(&unit)).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(identity = %identity, error = %e, "Script runner task failed");
                    let now = Local::now();
                    ExecutionOutcome {
                        identity,
                        output: format!("runner task failed: {}", e),
                        exit_status: UNAVAILABLE_EXIT_STATUS,
                        started_at: now,
                        finished_at: now,
                    }
                }
            };

            info!(
                identity = %outcome.identity,
                exit_status = outcome.exit_status,
                duration_ms = outcome.duration().num_milliseconds(),
                "Script finished"
            );
            debug!(identity = %outcome.identity, output = %outcome.output, "Script output");
            outcomes.push(outcome);
        }

        outcomes
    }

    /// Reports every outcome concurrently and returns the correlated
    /// results once all deliveries have settled.
    pub async fn report_all(&self, outcomes: Vec<ExecutionOutcome>) -> Vec<DeliveryResult> {
        collect(self.dispatch(outcomes)).await
    }

    /// Spawns one delivery task per outcome.
    fn dispatch(&self, outcomes: Vec<ExecutionOutcome>) -> Dispatch {
        let expected = outcomes.len();
        let (tx, rx) = mpsc::channel(expected.max(1));
        let mut tasks = Vec::with_capacity(expected);

        for outcome in outcomes {
            let tx = tx.clone();
            let reporter = self.reporter.clone();
            let identity = outcome.identity.clone();
            let handle = tokio::spawn(async move {
                let result = reporter.report(&outcome).await;
                // Capacity covers every task, so this never waits; it only
                // fails if the collector is gone.
                let _ = tx.send(result).await;
            });
            tasks.push((identity, handle));
        }

        Dispatch {
            expected,
            results: rx,
            tasks,
        }
    }
}

/// Drains exactly one result per dispatched outcome.
///
/// A delivery task that dies without sending is recorded as a failed
/// delivery for its identity.
async fn collect(mut dispatch: Dispatch) -> Vec<DeliveryResult> {
    let mut results = Vec::with_capacity(dispatch.expected);

    while results.len() < dispatch.expected {
        match dispatch.results.recv().await {
            Some(result) => {
                if result.delivered {
                    info!(identity = %result.identity, status = %result.status_text, "Conclusion delivered");
                } else {
                    warn!(identity = %result.identity, error = %result.status_text, "Conclusion not delivered");
                }
                results.push(result);
            }
            // Every sender is gone, so every task has ended.
            None => break,
        }
    }

    if results.len() < dispatch.expected {
        for (identity, handle) in dispatch.tasks {
            if let Err(e) = handle.await {
                warn!(identity = %identity, error = %e, "Delivery task failed");
                results.push(DeliveryResult::failed(
                    identity,
                    format!("delivery task failed: {}", e),
                ));
            }
        }
    }

    results
}

fn enter(run_id: &str, stage: PipelineStage) {
    debug!(run_id, stage = %stage, "Entering stage");
}
