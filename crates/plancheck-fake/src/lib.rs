//! Test doubles for plancheck.
//!
//! `FakeSessionRunner` answers scenarios from a script keyed by scenario name
//! and records what it was asked to do, including how many scenarios were in
//! flight at once.

use async_trait::async_trait;
use plancheck_adapters::{SessionError, SessionRunner};
use plancheck_types::Scenario;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

pub mod plans;

/// What the fake does when asked to run a scenario.
#[derive(Debug, Clone)]
pub enum FakeResponse {
    Plan(String),
    /// Sleep, then return the plan.
    Delayed(Duration, String),
    StatementError { statement: String, message: String },
    ConnectionError(String),
    /// The server cancelled the statement at `statement_timeout`.
    StatementTimeout { statement: String },
    /// Never completes; only a timeout gets the caller out.
    Hang,
}

impl FakeResponse {
    pub fn plan(text: impl Into<String>) -> Self {
        FakeResponse::Plan(text.into())
    }

    pub fn statement_error(statement: impl Into<String>, message: impl Into<String>) -> Self {
        FakeResponse::StatementError {
            statement: statement.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Default)]
struct State {
    responses: Mutex<HashMap<String, FakeResponse>>,
    fallback: Mutex<Option<FakeResponse>>,
    ping_error: Mutex<Option<String>>,
    calls: Mutex<Vec<Scenario>>,
    timeouts: Mutex<Vec<Duration>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

/// Scripted `SessionRunner`. Clones share state, so a test can keep a handle
/// while the use case owns another.
#[derive(Debug, Clone, Default)]
pub struct FakeSessionRunner {
    state: Arc<State>,
}

impl FakeSessionRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(self, scenario: impl Into<String>, response: FakeResponse) -> Self {
        lock(&self.state.responses).insert(scenario.into(), response);
        self
    }

    pub fn with_plan(self, scenario: impl Into<String>, plan: impl Into<String>) -> Self {
        self.with_response(scenario, FakeResponse::Plan(plan.into()))
    }

    /// Response for scenarios with no scripted entry.
    pub fn with_fallback(self, response: FakeResponse) -> Self {
        *lock(&self.state.fallback) = Some(response);
        self
    }

    pub fn with_failing_ping(self, message: impl Into<String>) -> Self {
        *lock(&self.state.ping_error) = Some(message.into());
        self
    }

    /// Names of scenarios run so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        lock(&self.state.calls)
            .iter()
            .map(|s| s.name.clone())
            .collect()
    }

    /// Full scenarios as received, setup statements included.
    pub fn received(&self) -> Vec<Scenario> {
        lock(&self.state.calls).clone()
    }

    /// Timeouts passed with each run, in call order.
    pub fn timeouts(&self) -> Vec<Duration> {
        lock(&self.state.timeouts).clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.state.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> usize {
        self.state.in_flight.load(Ordering::SeqCst)
    }

    fn response_for(&self, name: &str) -> Option<FakeResponse> {
        lock(&self.state.responses)
            .get(name)
            .cloned()
            .or_else(|| lock(&self.state.fallback).clone())
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Decrements the in-flight counter even when the future is dropped mid-run.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(state: &'a State) -> Self {
        let now = state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        state.max_in_flight.fetch_max(now, Ordering::SeqCst);
        InFlight(&state.in_flight)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl SessionRunner for FakeSessionRunner {
    async fn ping(&self) -> Result<(), SessionError> {
        match lock(&self.state.ping_error).clone() {
            Some(message) => Err(SessionError::Connection(message)),
            None => Ok(()),
        }
    }

    async fn run(&self, scenario: &Scenario, timeout: Duration) -> Result<String, SessionError> {
        lock(&self.state.calls).push(scenario.clone());
        lock(&self.state.timeouts).push(timeout);
        let _guard = InFlight::enter(&self.state);

        match self.response_for(&scenario.name) {
            Some(FakeResponse::Plan(plan)) => {
                tokio::task::yield_now().await;
                Ok(plan)
            }
            Some(FakeResponse::Delayed(delay, plan)) => {
                tokio::time::sleep(delay).await;
                Ok(plan)
            }
            Some(FakeResponse::StatementError { statement, message }) => {
                Err(SessionError::Statement { statement, message })
            }
            Some(FakeResponse::ConnectionError(message)) => Err(SessionError::Connection(message)),
            Some(FakeResponse::StatementTimeout { statement }) => Err(SessionError::Timeout {
                statement,
                message: format!(
                    "canceling statement due to statement timeout (SQLSTATE {})",
                    plancheck_adapters::QUERY_CANCELED
                ),
            }),
            Some(FakeResponse::Hang) => std::future::pending().await,
            None => Err(SessionError::Statement {
                statement: scenario.query.clone(),
                message: format!("no scripted response for scenario '{}'", scenario.name),
            }),
        }
    }
}
