//! Report aggregation and the exit-code policy.

use plancheck_types::{Outcome, REPORT_SCHEMA_V1, Report, ToolInfo, Verdict, VerdictCounts};

/// Every scenario passed (or only warned, without `--fail-on-warn`).
pub const EXIT_OK: i32 = 0;
/// At least one scenario failed or errored.
pub const EXIT_FAILED: i32 = 1;
/// Config or connection problem before any scenario ran.
pub const EXIT_SETUP: i32 = 2;
/// Only warnings, and `--fail-on-warn` was given.
pub const EXIT_WARN: i32 = 3;

/// Fold verdicts into a report. Order is preserved.
///
/// # Invariants
///
/// - `counts.total() == verdicts.len()`
/// - the same verdicts always give the same counts
pub fn aggregate(
    tool: ToolInfo,
    started_at: String,
    ended_at: String,
    verdicts: Vec<Verdict>,
) -> Report {
    let mut counts = VerdictCounts::default();
    for v in &verdicts {
        match v.outcome {
            Outcome::Pass => counts.pass += 1,
            Outcome::Warn => counts.warn += 1,
            Outcome::Fail => counts.fail += 1,
            Outcome::Error => counts.error += 1,
        }
    }

    Report {
        schema: REPORT_SCHEMA_V1.to_string(),
        tool,
        started_at,
        ended_at,
        verdicts,
        counts,
    }
}

pub fn exit_code(report: &Report, fail_on_warn: bool) -> i32 {
    match report.overall() {
        Outcome::Pass => EXIT_OK,
        Outcome::Warn if fail_on_warn => EXIT_WARN,
        Outcome::Warn => EXIT_OK,
        Outcome::Fail | Outcome::Error => EXIT_FAILED,
    }
}
