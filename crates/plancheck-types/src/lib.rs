//! Shared types for plancheck.
//!
//! Design goal: versioned, explicit, boring.
//! These structs describe scenario files, the facts extracted from a query
//! plan, and the report a run produces.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const REPORT_SCHEMA_V1: &str = "plancheck.report.v1";

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct ToolInfo {
    pub name: String,
    pub version: String,
}

// ----------------------------
// Scenario file schema
// ----------------------------

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
pub struct ConfigFile {
    #[serde(default)]
    pub defaults: DefaultsConfig,

    #[serde(default)]
    pub connection: ConnectionConfig,

    #[serde(default, rename = "scenario")]
    pub scenarios: Vec<Scenario>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
pub struct DefaultsConfig {
    /// Per-scenario timeout, parseable by humantime, e.g. "30s".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,

    /// Maximum number of scenarios in flight, each on its own session.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parallel: Option<usize>,

    /// Max bytes of plan text retained per scenario.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_cap_bytes: Option<usize>,
}

/// Where to find the target engine.
///
/// `url` wins over the discrete fields. Unset discrete fields fall back to the
/// libpq `PG*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
pub struct ConnectionConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct Scenario {
    pub name: String,

    /// Session-scoped statements run in order before the query,
    /// e.g. `SET work_mem = '1MB'`.
    #[serde(default)]
    pub setup: Vec<String>,

    pub query: String,

    pub expect: Predicate,

    /// When false the query is planned but not executed (`EXPLAIN` without `ANALYZE`).
    ///
    /// When true the query really runs, inside a transaction that is always
    /// rolled back, so `INSERT`/`UPDATE`/`DELETE` leave no rows behind. Setup
    /// statements run before that transaction and do persist.
    #[serde(default = "default_analyze")]
    pub analyze: bool,
}

fn default_analyze() -> bool {
    true
}

/// Expected-fact predicate over a parsed plan.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Predicate {
    MustContainOperator {
        operator: String,
    },
    MustNotContainOperator {
        operator: String,
    },
    /// Actual vs estimated row count, in either direction.
    RowEstimateWithinFactor {
        max_ratio: f64,
    },
    #[serde(rename = "all")]
    CompositeAnd {
        of: Vec<Predicate>,
    },
    /// Case-insensitive substring over the raw plan text.
    MustContainText {
        text: String,
    },
    MustNotContainText {
        text: String,
    },
    ExecutionTimeBelow {
        max_ms: f64,
    },
    /// `hit / (hit + read)` over shared buffers.
    BufferHitRatioAtLeast {
        min_ratio: f64,
    },
}

impl Predicate {
    pub fn contains(operator: impl Into<String>) -> Self {
        Predicate::MustContainOperator {
            operator: operator.into(),
        }
    }

    pub fn not_contains(operator: impl Into<String>) -> Self {
        Predicate::MustNotContainOperator {
            operator: operator.into(),
        }
    }

    pub fn all(of: Vec<Predicate>) -> Self {
        Predicate::CompositeAnd { of }
    }
}

// ----------------------------
// Plan facts
// ----------------------------

/// Facts extracted from textual `EXPLAIN` output.
///
/// Absent numbers stay `None`: zero is a real observation.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
pub struct PlanFacts {
    pub operators: BTreeSet<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_rows: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_rows: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub buffer_reads: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub buffer_hits: Option<u64>,

    #[serde(default)]
    pub external_sort_detected: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub planning_time_ms: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_time_ms: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub workers_launched: Option<u64>,
}

// ----------------------------
// Verdicts and report
// ----------------------------

#[derive(Debug, Copy, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Pass,
    Warn,
    Fail,
    Error,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Pass => "pass",
            Outcome::Warn => "warn",
            Outcome::Fail => "fail",
            Outcome::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct Verdict {
    pub scenario: String,
    pub outcome: Outcome,
    pub reason: String,

    /// Plan text (or engine error text) as captured, for debugging.
    #[serde(default)]
    pub raw_output: String,

    /// None when the scenario never produced a plan.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facts: Option<PlanFacts>,

    #[serde(default)]
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
pub struct VerdictCounts {
    pub pass: u32,
    pub warn: u32,
    pub fail: u32,
    pub error: u32,
}

impl VerdictCounts {
    pub fn total(&self) -> u32 {
        self.pass + self.warn + self.fail + self.error
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct Report {
    pub schema: String,
    pub tool: ToolInfo,
    pub started_at: String,
    pub ended_at: String,
    pub verdicts: Vec<Verdict>,
    pub counts: VerdictCounts,
}

impl Report {
    /// Worst outcome across all verdicts; `Pass` for an empty report.
    pub fn overall(&self) -> Outcome {
        if self.counts.error > 0 {
            Outcome::Error
        } else if self.counts.fail > 0 {
            Outcome::Fail
        } else if self.counts.warn > 0 {
            Outcome::Warn
        } else {
            Outcome::Pass
        }
    }
}
