//! Human-facing renderings of a report.

use plancheck_types::{Outcome, Report, Verdict};

/// Raw plan text shown under a failing scenario on the console.
const CONSOLE_RAW_CAP: usize = 1024;

/// One line per scenario, raw output under failures and errors, then a summary.
pub fn render_console(report: &Report) -> String {
    let mut out = String::new();

    for v in &report.verdicts {
        out.push_str(&format!(
            "{tag:<5} {name}: {reason} ({ms} ms)\n",
            tag = v.outcome.as_str().to_uppercase(),
            name = v.scenario,
            reason = v.reason,
            ms = v.elapsed_ms,
        ));

        if matches!(v.outcome, Outcome::Fail | Outcome::Error) && !v.raw_output.is_empty() {
            let (shown, cut) = clip(&v.raw_output, CONSOLE_RAW_CAP);
            for line in shown.lines() {
                out.push_str("      | ");
                out.push_str(line);
                out.push('\n');
            }
            if cut {
                out.push_str("      | ... (truncated)\n");
            }
        }
    }

    out.push_str(&summary_line(report));
    out.push('\n');
    out
}

fn summary_line(report: &Report) -> String {
    let c = &report.counts;
    format!(
        "{} scenarios: {} pass, {} warn, {} fail, {} error",
        c.total(),
        c.pass,
        c.warn,
        c.fail,
        c.error
    )
}

pub fn render_markdown(report: &Report) -> String {
    let mut out = String::new();

    let header = match report.overall() {
        Outcome::Pass => "✅ plancheck: pass",
        Outcome::Warn => "⚠️ plancheck: warn",
        Outcome::Fail => "❌ plancheck: fail",
        Outcome::Error => "❌ plancheck: error",
    };

    out.push_str(header);
    out.push_str("\n\n");
    out.push_str(&format!("**{}**\n\n", summary_line(report)));

    out.push_str("| scenario | status | reason | elapsed |\n");
    out.push_str("|---|---|---|---:|\n");

    for v in &report.verdicts {
        out.push_str(&format!(
            "| `{name}` | {icon} {status} | {reason} | {ms} ms |\n",
            name = md_cell(&v.scenario),
            icon = status_icon(v.outcome),
            status = v.outcome.as_str(),
            reason = md_cell(&v.reason),
            ms = v.elapsed_ms,
        ));
    }

    let failing: Vec<&Verdict> = report
        .verdicts
        .iter()
        .filter(|v| matches!(v.outcome, Outcome::Fail | Outcome::Error))
        .filter(|v| !v.raw_output.is_empty())
        .collect();
    if !failing.is_empty() {
        out.push_str("\n**Plans:**\n");
        for v in failing {
            let (shown, cut) = clip(&v.raw_output, CONSOLE_RAW_CAP);
            out.push_str(&format!(
                "\n<details><summary>{}</summary>\n\n```\n{}{}\n```\n\n</details>\n",
                md_cell(&v.scenario),
                shown,
                if cut { "\n..." } else { "" }
            ));
        }
    }

    out
}

pub fn github_annotations(report: &Report) -> Vec<String> {
    let mut lines = Vec::new();

    for v in &report.verdicts {
        let prefix = match v.outcome {
            Outcome::Fail | Outcome::Error => "::error",
            Outcome::Warn => "::warning",
            Outcome::Pass => continue,
        };

        let msg = format!(
            "plancheck {name} {status}: {reason}",
            name = v.scenario,
            status = v.outcome.as_str(),
            reason = v.reason,
        );
        lines.push(format!("{prefix}::{}", escape_annotation(&msg)));
    }

    lines
}

fn status_icon(outcome: Outcome) -> &'static str {
    match outcome {
        Outcome::Pass => "✅",
        Outcome::Warn => "⚠️",
        Outcome::Fail | Outcome::Error => "❌",
    }
}

fn md_cell(s: &str) -> String {
    s.replace('|', "\\|").replace('\n', " ")
}

// Workflow commands treat %, CR and LF specially.
fn escape_annotation(s: &str) -> String {
    s.replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

/// Prefix of at most `cap` bytes on a char boundary, and whether anything was cut.
fn clip(s: &str, cap: usize) -> (&str, bool) {
    if s.len() <= cap {
        return (s, false);
    }
    let mut end = cap;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    (&s[..end], true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate;
    use plancheck_types::ToolInfo;

    fn verdict(name: &str, outcome: Outcome, reason: &str, raw: &str) -> Verdict {
        Verdict {
            scenario: name.to_string(),
            outcome,
            reason: reason.to_string(),
            raw_output: raw.to_string(),
            facts: None,
            elapsed_ms: 7,
        }
    }

    fn report(verdicts: Vec<Verdict>) -> Report {
        aggregate(
            ToolInfo {
                name: "plancheck".into(),
                version: "0.1.0".into(),
            },
            "2026-01-01T00:00:00Z".into(),
            "2026-01-01T00:00:01Z".into(),
            verdicts,
        )
    }

    #[test]
    fn console_shows_raw_output_only_for_failures() {
        let r = report(vec![
            verdict("ok", Outcome::Pass, "found operator `Sort`", "Sort  (cost=...)"),
            verdict(
                "bad",
                Outcome::Fail,
                "expected operator `Index Scan` not found (found: Seq Scan)",
                "Seq Scan on orders  (cost=0.00..1943.00 rows=50 width=44)",
            ),
        ]);
        let text = render_console(&r);
        let lines: Vec<_> = text.lines().collect();

        assert_eq!(lines[0], "PASS  ok: found operator `Sort` (7 ms)");
        assert!(lines[1].starts_with("FAIL  bad: expected operator `Index Scan`"));
        assert_eq!(
            lines[2],
            "      | Seq Scan on orders  (cost=0.00..1943.00 rows=50 width=44)"
        );
        assert!(!text.contains("Sort  (cost=...)"));
        assert_eq!(
            lines.last().copied(),
            Some("2 scenarios: 1 pass, 0 warn, 1 fail, 0 error")
        );
    }

    #[test]
    fn console_truncates_long_raw_output() {
        let raw = "x".repeat(CONSOLE_RAW_CAP * 3);
        let r = report(vec![verdict("big", Outcome::Error, "timeout", &raw)]);
        let text = render_console(&r);
        assert!(text.contains("... (truncated)"));
        assert!(text.len() < raw.len());
    }

    #[test]
    fn markdown_renders_table_and_header() {
        let r = report(vec![
            verdict("spill", Outcome::Pass, "found operator `external merge`", ""),
            verdict("estimate", Outcome::Warn, "insufficient data | maybe", ""),
        ]);
        let md = render_markdown(&r);
        assert!(md.starts_with("⚠️ plancheck: warn"));
        assert!(md.contains("| scenario | status | reason | elapsed |"));
        assert!(md.contains("| `spill` | ✅ pass |"));
        assert!(md.contains("insufficient data \\| maybe"));
        assert!(!md.contains("**Plans:**"));
    }

    #[test]
    fn markdown_includes_failing_plans() {
        let r = report(vec![verdict(
            "wants index",
            Outcome::Fail,
            "not found",
            "Seq Scan on orders",
        )]);
        let md = render_markdown(&r);
        assert!(md.starts_with("❌ plancheck: fail"));
        assert!(md.contains("<summary>wants index</summary>"));
        assert!(md.contains("```\nSeq Scan on orders\n```"));
    }

    #[test]
    fn annotations_skip_passes_and_escape_newlines() {
        let r = report(vec![
            verdict("ok", Outcome::Pass, "fine", ""),
            verdict("slow", Outcome::Warn, "insufficient data", ""),
            verdict("broken", Outcome::Error, "statement failed:\nline two", ""),
        ]);
        let lines = github_annotations(&r);
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            "::warning::plancheck slow warn: insufficient data"
        );
        assert_eq!(
            lines[1],
            "::error::plancheck broken error: statement failed:%0Aline two"
        );
    }

    #[test]
    fn clip_respects_char_boundaries() {
        assert_eq!(clip("héllo", 2), ("h", true));
        assert_eq!(clip("abc", 10), ("abc", false));
    }
}
