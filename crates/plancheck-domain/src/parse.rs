//! Heuristic parser for PostgreSQL's textual `EXPLAIN` output.
//!
//! The text format is prose that shifts between server versions, so the parser
//! never fails: anything it does not recognize contributes no facts.

use plancheck_types::PlanFacts;
use regex::Regex;
use std::sync::LazyLock;

/// Plan node names the parser records, after stripping `Parallel`,
/// `Partial`/`Finalize` and join qualifiers.
pub const KNOWN_OPERATORS: &[&str] = &[
    "Seq Scan",
    "Index Scan",
    "Index Only Scan",
    "Bitmap Heap Scan",
    "Bitmap Index Scan",
    "BitmapAnd",
    "BitmapOr",
    "Tid Scan",
    "Tid Range Scan",
    "Subquery Scan",
    "Function Scan",
    "Values Scan",
    "CTE Scan",
    "WorkTable Scan",
    "Foreign Scan",
    "Custom Scan",
    "Sample Scan",
    "Hash Join",
    "Merge Join",
    "Nested Loop",
    "Hash",
    "Sort",
    "Incremental Sort",
    "Aggregate",
    "HashAggregate",
    "GroupAggregate",
    "MixedAggregate",
    "WindowAgg",
    "Group",
    "Unique",
    "Limit",
    "Gather",
    "Gather Merge",
    "Append",
    "Merge Append",
    "Materialize",
    "Memoize",
    "Result",
    "ProjectSet",
    "SetOp",
    "HashSetOp",
    "LockRows",
    "Insert",
    "Update",
    "Delete",
    "Merge",
];

/// Words that qualify a node without changing its operator.
const QUALIFIERS: &[&str] = &["Left", "Right", "Full", "Semi", "Anti", "Backward"];

/// Disk-backed sort markers, as they appear on `Sort Method:` lines.
const SPILL_MARKERS: &[&str] = &["external merge", "external sort"];

static ESTIMATED_ROWS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\(cost=\d+(?:\.\d+)?\.\.\d+(?:\.\d+)? rows=(\d+)").expect("valid regex")
});

// `time=` is missing under TIMING OFF; PostgreSQL 18 prints fractional rows.
static ACTUAL_ROWS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\(actual(?: time=\d+(?:\.\d+)?\.\.\d+(?:\.\d+)?)? rows=(\d+)")
        .expect("valid regex")
});

static BUFFER_HITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Buffers: shared hit=(\d+)").expect("valid regex"));

static BUFFER_READS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Buffers: shared(?: hit=\d+)? read=(\d+)").expect("valid regex")
});

static PLANNING_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)planning time: (\d+(?:\.\d+)?) ms").expect("valid regex")
});

static EXECUTION_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:execution time|total runtime): (\d+(?:\.\d+)?) ms").expect("valid regex")
});

static WORKERS_LAUNCHED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Workers Launched: (\d+)").expect("valid regex"));

/// Extract plan facts from raw `EXPLAIN` text. Total: never fails.
pub fn parse_plan(raw: &str) -> PlanFacts {
    let mut facts = PlanFacts::default();

    let mut seen_node = false;
    for line in raw.lines() {
        let line = line.trim();
        if is_noise(line) {
            continue;
        }
        if is_node_line(line, seen_node) {
            seen_node = true;
            if let Some(op) = canonical_operator(node_label(line)) {
                facts.operators.insert(op);
            }
        }
    }

    let lower = raw.to_lowercase();
    for marker in SPILL_MARKERS {
        if lower.contains(marker) {
            facts.operators.insert((*marker).to_string());
            facts.external_sort_detected = true;
        }
    }

    facts.estimated_rows = first_u64(&ESTIMATED_ROWS, raw);
    facts.actual_rows = first_u64(&ACTUAL_ROWS, raw);
    facts.buffer_hits = first_u64(&BUFFER_HITS, raw);
    facts.buffer_reads = first_u64(&BUFFER_READS, raw);
    facts.planning_time_ms = first_f64(&PLANNING_TIME, raw);
    facts.execution_time_ms = first_f64(&EXECUTION_TIME, raw);
    facts.workers_launched = first_u64(&WORKERS_LAUNCHED, raw);

    facts
}

/// psql framing: the column header and its underline.
fn is_noise(line: &str) -> bool {
    line.is_empty() || line == "QUERY PLAN" || line.chars().all(|c| c == '-' || c == '+')
}

/// The root node has no arrow; every child does.
fn is_node_line(line: &str, seen_node: bool) -> bool {
    line.starts_with("->")
        || !seen_node
        || line.contains("(cost=")
        || line.contains("(actual ")
        || line.contains("(never executed)")
}

fn node_label(line: &str) -> &str {
    let s = line.strip_prefix("->").unwrap_or(line).trim_start();
    let end = [" (", " on ", " using "]
        .iter()
        .filter_map(|sep| s.find(sep))
        .min()
        .unwrap_or(s.len());
    s[..end].trim_end()
}

fn canonical_operator(label: &str) -> Option<String> {
    let mut words: Vec<&str> = label.split_whitespace().collect();
    if matches!(words.first(), Some(&"Partial") | Some(&"Finalize")) {
        words.remove(0);
    }
    let parallel = words.first() == Some(&"Parallel");
    if parallel {
        words.remove(0);
    }
    words.retain(|w| !QUALIFIERS.contains(w));

    let mut base = words.join(" ");
    if base == "Nested Loop Join" {
        base = "Nested Loop".to_string();
    }

    let known = KNOWN_OPERATORS.iter().find(|k| **k == base)?;
    Some(if parallel {
        format!("Parallel {known}")
    } else {
        (*known).to_string()
    })
}

fn first_u64(re: &Regex, raw: &str) -> Option<u64> {
    re.captures(raw)?.get(1)?.as_str().parse().ok()
}

fn first_f64(re: &Regex, raw: &str) -> Option<f64> {
    re.captures(raw)?.get(1)?.as_str().parse().ok()
}
