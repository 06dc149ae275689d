//! Verdict policy: evaluate a predicate tree against plan facts.

use plancheck_types::{Outcome, PlanFacts, Predicate};

#[derive(Debug, Clone, PartialEq)]
pub struct Judgement {
    pub outcome: Outcome,
    pub reason: String,
}

impl Judgement {
    fn pass(reason: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Pass,
            reason: reason.into(),
        }
    }

    fn fail(reason: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Fail,
            reason: reason.into(),
        }
    }

    fn warn(reason: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Warn,
            reason: reason.into(),
        }
    }
}

/// Judge `facts` (parsed from `raw`) against `expected`.
///
/// Never yields `Outcome::Error`: execution errors bypass the comparator.
pub fn judge(facts: &PlanFacts, raw: &str, expected: &Predicate) -> Judgement {
    match expected {
        Predicate::MustContainOperator { operator } => match find_operator(facts, operator) {
            Some(found) => Judgement::pass(format!("found operator `{found}`")),
            None => Judgement::fail(format!(
                "expected operator `{operator}` not found (found: {})",
                list_operators(facts)
            )),
        },

        Predicate::MustNotContainOperator { operator } => match find_operator(facts, operator) {
            Some(found) => Judgement::fail(format!(
                "unexpected operator `{operator}` present (matched `{found}`)"
            )),
            None => Judgement::pass(format!("operator `{operator}` absent")),
        },

        Predicate::RowEstimateWithinFactor { max_ratio } => {
            let (Some(actual), Some(estimated)) = (facts.actual_rows, facts.estimated_rows) else {
                return Judgement::warn(format!(
                    "insufficient data: row estimate needs actual and estimated rows (actual {}, estimated {})",
                    fmt_opt(facts.actual_rows),
                    fmt_opt(facts.estimated_rows)
                ));
            };
            // Clamp zeros so the ratio stays finite in both directions.
            let a = actual.max(1) as f64;
            let e = estimated.max(1) as f64;
            let ratio = (a / e).max(e / a);
            if ratio <= *max_ratio {
                Judgement::pass(format!(
                    "row estimate within {ratio:.2}x (actual {actual}, estimated {estimated}, max {max_ratio:.2}x)"
                ))
            } else {
                Judgement::fail(format!(
                    "row estimate off by {ratio:.2}x (actual {actual}, estimated {estimated}, max {max_ratio:.2}x)"
                ))
            }
        }

        Predicate::CompositeAnd { of } => {
            let mut first_warn: Option<Judgement> = None;
            for child in of {
                let j = judge(facts, raw, child);
                match j.outcome {
                    Outcome::Fail | Outcome::Error => return j,
                    Outcome::Warn if first_warn.is_none() => first_warn = Some(j),
                    Outcome::Warn => {}
                    Outcome::Pass => {}
                }
            }
            first_warn.unwrap_or_else(|| Judgement::pass(format!("all {} checks passed", of.len())))
        }

        Predicate::MustContainText { text } => {
            if contains_ci(raw, text) {
                Judgement::pass(format!("plan mentions `{text}`"))
            } else {
                Judgement::fail(format!("expected plan text `{text}` not found"))
            }
        }

        Predicate::MustNotContainText { text } => {
            if contains_ci(raw, text) {
                Judgement::fail(format!("unexpected plan text `{text}` present"))
            } else {
                Judgement::pass(format!("plan does not mention `{text}`"))
            }
        }

        Predicate::ExecutionTimeBelow { max_ms } => match facts.execution_time_ms {
            None => Judgement::warn("insufficient data: execution time not reported"),
            Some(ms) if ms < *max_ms => {
                Judgement::pass(format!("execution time {ms:.3} ms < {max_ms:.3} ms"))
            }
            Some(ms) => Judgement::fail(format!(
                "execution time {ms:.3} ms exceeds {max_ms:.3} ms"
            )),
        },

        Predicate::BufferHitRatioAtLeast { min_ratio } => {
            let hits = facts.buffer_hits.unwrap_or(0);
            let reads = facts.buffer_reads.unwrap_or(0);
            // Both counts may be anywhere in u64 range.
            let total = u128::from(hits) + u128::from(reads);
            if total == 0 {
                return Judgement::warn("insufficient data: no shared buffer activity reported");
            }
            let ratio = hits as f64 / total as f64;
            if ratio >= *min_ratio {
                Judgement::pass(format!(
                    "buffer hit ratio {ratio:.3} >= {min_ratio:.3} (hit {hits}, read {reads})"
                ))
            } else {
                Judgement::fail(format!(
                    "buffer hit ratio {ratio:.3} below {min_ratio:.3} (hit {hits}, read {reads})"
                ))
            }
        }
    }
}

/// Case-insensitive substring match, the same way operators were extracted.
fn find_operator<'a>(facts: &'a PlanFacts, wanted: &str) -> Option<&'a str> {
    let wanted = wanted.to_lowercase();
    facts
        .operators
        .iter()
        .find(|op| op.to_lowercase().contains(&wanted))
        .map(String::as_str)
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn list_operators(facts: &PlanFacts) -> String {
    if facts.operators.is_empty() {
        "none".to_string()
    } else {
        facts
            .operators
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn fmt_opt(v: Option<u64>) -> String {
    v.map_or_else(|| "absent".to_string(), |v| v.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn facts_with_ops(ops: &[&str]) -> PlanFacts {
        PlanFacts {
            operators: ops.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>(),
            ..PlanFacts::default()
        }
    }

    fn rows(actual: Option<u64>, estimated: Option<u64>) -> PlanFacts {
        PlanFacts {
            actual_rows: actual,
            estimated_rows: estimated,
            ..PlanFacts::default()
        }
    }

    #[test]
    fn missing_operator_fails_and_names_it() {
        let facts = facts_with_ops(&["Seq Scan"]);
        let j = judge(&facts, "", &Predicate::contains("Index Scan"));
        assert_eq!(j.outcome, Outcome::Fail);
        assert!(j.reason.contains("Index Scan"), "reason: {}", j.reason);
        assert!(j.reason.contains("Seq Scan"), "reason lists what was found");
    }

    #[test]
    fn operator_match_is_case_insensitive_substring() {
        let facts = facts_with_ops(&["Parallel Seq Scan"]);
        let j = judge(&facts, "", &Predicate::contains("seq scan"));
        assert_eq!(j.outcome, Outcome::Pass);
        assert!(j.reason.contains("Parallel Seq Scan"));
    }

    #[test]
    fn must_not_contain_fails_when_present() {
        let facts = facts_with_ops(&["Sort", "external merge"]);
        let j = judge(&facts, "", &Predicate::not_contains("External Merge"));
        assert_eq!(j.outcome, Outcome::Fail);
        assert!(j.reason.contains("external merge"));

        let clean = facts_with_ops(&["Sort"]);
        let j = judge(&clean, "", &Predicate::not_contains("external merge"));
        assert_eq!(j.outcome, Outcome::Pass);
    }

    #[test]
    fn row_estimate_within_factor_passes() {
        let j = judge(
            &rows(Some(100), Some(50)),
            "",
            &Predicate::RowEstimateWithinFactor { max_ratio: 3.0 },
        );
        assert_eq!(j.outcome, Outcome::Pass, "ratio 2 <= 3: {}", j.reason);
    }

    #[test]
    fn row_estimate_checks_both_directions() {
        let j = judge(
            &rows(Some(10), Some(1000)),
            "",
            &Predicate::RowEstimateWithinFactor { max_ratio: 3.0 },
        );
        assert_eq!(j.outcome, Outcome::Fail);
        assert!(j.reason.contains("100.00x"), "reason: {}", j.reason);
    }

    #[test]
    fn row_estimate_without_estimate_warns() {
        let j = judge(
            &rows(Some(100), None),
            "",
            &Predicate::RowEstimateWithinFactor { max_ratio: 3.0 },
        );
        assert_eq!(j.outcome, Outcome::Warn);
        assert!(j.reason.starts_with("insufficient data"));
    }

    #[test]
    fn row_estimate_with_zero_actual_stays_finite() {
        let j = judge(
            &rows(Some(0), Some(1)),
            "",
            &Predicate::RowEstimateWithinFactor { max_ratio: 1.0 },
        );
        assert_eq!(j.outcome, Outcome::Pass);
    }

    #[test]
    fn composite_reports_first_failure() {
        let facts = facts_with_ops(&["Seq Scan"]);
        let p = Predicate::all(vec![
            Predicate::contains("Seq Scan"),
            Predicate::contains("Hash Join"),
            Predicate::contains("Merge Join"),
        ]);
        let j = judge(&facts, "", &p);
        assert_eq!(j.outcome, Outcome::Fail);
        assert!(j.reason.contains("Hash Join"));
        assert!(!j.reason.contains("Merge Join"), "short-circuits on first failure");
    }

    #[test]
    fn composite_warns_when_no_child_fails() {
        let facts = facts_with_ops(&["Seq Scan"]);
        let p = Predicate::all(vec![
            Predicate::contains("Seq Scan"),
            Predicate::RowEstimateWithinFactor { max_ratio: 2.0 },
        ]);
        assert_eq!(judge(&facts, "", &p).outcome, Outcome::Warn);
    }

    #[test]
    fn composite_failure_beats_earlier_warning() {
        let facts = facts_with_ops(&["Seq Scan"]);
        let p = Predicate::all(vec![
            Predicate::RowEstimateWithinFactor { max_ratio: 2.0 },
            Predicate::contains("Index Scan"),
        ]);
        assert_eq!(judge(&facts, "", &p).outcome, Outcome::Fail);
    }

    #[test]
    fn empty_composite_passes() {
        let j = judge(&PlanFacts::default(), "", &Predicate::all(vec![]));
        assert_eq!(j.outcome, Outcome::Pass);
    }

    #[test]
    fn text_predicates_match_raw_output() {
        let raw = "Append (actual rows=5 loops=1)\n  Subplans Removed: 3";
        let facts = PlanFacts::default();
        let contains = Predicate::MustContainText {
            text: "subplans removed".into(),
        };
        let absent = Predicate::MustNotContainText {
            text: "Subplans Removed".into(),
        };
        assert_eq!(judge(&facts, raw, &contains).outcome, Outcome::Pass);
        assert_eq!(judge(&facts, raw, &absent).outcome, Outcome::Fail);
    }

    #[test]
    fn execution_time_threshold() {
        let facts = PlanFacts {
            execution_time_ms: Some(12.5),
            ..PlanFacts::default()
        };
        let fast = Predicate::ExecutionTimeBelow { max_ms: 50.0 };
        let slow = Predicate::ExecutionTimeBelow { max_ms: 10.0 };
        assert_eq!(judge(&facts, "", &fast).outcome, Outcome::Pass);
        assert_eq!(judge(&facts, "", &slow).outcome, Outcome::Fail);
        assert_eq!(
            judge(&PlanFacts::default(), "", &fast).outcome,
            Outcome::Warn
        );
    }

    #[test]
    fn buffer_hit_ratio() {
        let warm = PlanFacts {
            buffer_hits: Some(95),
            buffer_reads: Some(5),
            ..PlanFacts::default()
        };
        let cold = PlanFacts {
            buffer_hits: None,
            buffer_reads: Some(40),
            ..PlanFacts::default()
        };
        let p = Predicate::BufferHitRatioAtLeast { min_ratio: 0.9 };
        assert_eq!(judge(&warm, "", &p).outcome, Outcome::Pass);
        assert_eq!(judge(&cold, "", &p).outcome, Outcome::Fail);
        assert_eq!(judge(&PlanFacts::default(), "", &p).outcome, Outcome::Warn);
    }

    #[test]
    fn buffer_hit_ratio_handles_counters_near_u64_max() {
        let raw = "Seq Scan on t  (cost=0.00..1.00 rows=1 width=4) (actual time=0.010..0.011 rows=1 loops=1)\n  Buffers: shared hit=18446744073709551615 read=1";
        let facts = crate::parse_plan(raw);
        assert_eq!(facts.buffer_hits, Some(u64::MAX));
        assert_eq!(facts.buffer_reads, Some(1));

        let j = judge(&facts, raw, &Predicate::BufferHitRatioAtLeast { min_ratio: 0.5 });
        assert_eq!(j.outcome, Outcome::Pass, "reason: {}", j.reason);
        assert!(j.reason.contains("read 1"), "reason: {}", j.reason);
    }

    #[test]
    fn same_facts_same_outcome() {
        let facts = facts_with_ops(&["Seq Scan", "Sort"]);
        let p = Predicate::not_contains("external merge");
        assert_eq!(judge(&facts, "", &p), judge(&facts, "", &p));
    }
}
