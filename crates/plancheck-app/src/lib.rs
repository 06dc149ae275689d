//! Application layer for plancheck.
//!
//! The app layer coordinates the session adapter and the plan domain.
//! It does not parse CLI flags and it does not do filesystem I/O.

mod export;
mod render;
mod report;

pub use export::{ExportFormat, ExportUseCase, VerdictExportRow};
pub use render::{github_annotations, render_console, render_markdown};
pub use report::{EXIT_FAILED, EXIT_OK, EXIT_SETUP, EXIT_WARN, aggregate, exit_code};

use anyhow::Context;
use futures::stream::{self, StreamExt};
use plancheck_adapters::{SessionError, SessionRunner};
use plancheck_domain::{judge, parse_plan};
use plancheck_types::{Outcome, Report, Scenario, ToolInfo, Verdict};
use std::time::{Duration, Instant};
use tracing::{Instrument, debug, info, info_span, warn};

pub trait Clock: Send + Sync {
    fn now_rfc3339(&self) -> String;
}

#[derive(Debug, Default, Clone)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_rfc3339(&self) -> String {
        use time::format_description::well_known::Rfc3339;
        time::OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
    }
}

#[derive(Debug, Clone)]
pub struct RunScenariosRequest {
    /// Declaration order; the report keeps it.
    pub scenarios: Vec<Scenario>,

    /// Bound on a single scenario, setup statements included.
    pub timeout: Duration,

    /// Max scenarios in flight. 1 means strictly sequential.
    pub parallel: usize,
}

pub struct RunScenariosUseCase<R: SessionRunner, C: Clock> {
    runner: R,
    clock: C,
    tool: ToolInfo,
}

impl<R: SessionRunner, C: Clock> RunScenariosUseCase<R, C> {
    pub fn new(runner: R, clock: C, tool: ToolInfo) -> Self {
        Self {
            runner,
            clock,
            tool,
        }
    }

    /// Fails when the engine cannot be reached, before any scenario runs.
    pub async fn check_connection(&self) -> anyhow::Result<()> {
        self.runner
            .ping()
            .await
            .context("cannot reach the database")
    }

    /// Run every scenario and fold the verdicts into a report.
    ///
    /// Scenario failures never abort the run: each one becomes a verdict.
    pub async fn execute(&self, req: RunScenariosRequest) -> Report {
        let started_at = self.clock.now_rfc3339();
        let parallel = req.parallel.max(1);
        info!(
            scenarios = req.scenarios.len(),
            parallel, "running scenarios"
        );

        let verdicts: Vec<Verdict> = stream::iter(req.scenarios.iter())
            .map(|scenario| self.run_one(scenario, req.timeout))
            .buffered(parallel)
            .collect()
            .await;

        let ended_at = self.clock.now_rfc3339();
        aggregate(self.tool.clone(), started_at, ended_at, verdicts)
    }

    pub async fn run_one(&self, scenario: &Scenario, timeout: Duration) -> Verdict {
        let span = info_span!("scenario", scenario = %scenario.name);
        async {
            let start = Instant::now();
            // The runner also sets the limit on the server; this one covers connecting
            // and a server that never answers.
            let result =
                tokio::time::timeout(timeout, self.runner.run(scenario, timeout)).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;

            let verdict = match result {
                Err(_) => {
                    warn!(timeout_ms = timeout.as_millis() as u64, "scenario timed out");
                    Verdict {
                        scenario: scenario.name.clone(),
                        outcome: Outcome::Error,
                        reason: "timeout".to_string(),
                        raw_output: String::new(),
                        facts: None,
                        elapsed_ms,
                    }
                }
                Ok(Err(err)) => {
                    warn!(error = %err, "scenario errored");
                    session_error_verdict(scenario, err, elapsed_ms)
                }
                Ok(Ok(raw)) => {
                    let facts = parse_plan(&raw);
                    debug!(operators = ?facts.operators, "plan parsed");
                    let judgement = judge(&facts, &raw, &scenario.expect);
                    Verdict {
                        scenario: scenario.name.clone(),
                        outcome: judgement.outcome,
                        reason: judgement.reason,
                        raw_output: raw,
                        facts: Some(facts),
                        elapsed_ms,
                    }
                }
            };

            info!(outcome = verdict.outcome.as_str(), elapsed_ms, "scenario finished");
            verdict
        }
        .instrument(span)
        .await
    }
}

fn session_error_verdict(scenario: &Scenario, err: SessionError, elapsed_ms: u64) -> Verdict {
    // A server-side cancel reads the same as the client-side timeout.
    let reason = match &err {
        SessionError::Timeout { .. } => "timeout".to_string(),
        other => other.to_string(),
    };
    let raw_output = match err {
        SessionError::Statement { message, .. }
        | SessionError::Connection(message)
        | SessionError::Timeout { message, .. } => message,
    };
    Verdict {
        scenario: scenario.name.clone(),
        outcome: Outcome::Error,
        reason,
        raw_output,
        facts: None,
        elapsed_ms,
    }
}
