//! Export a report as one row per scenario, for trend tracking.

use plancheck_types::{Report, Verdict};
use std::str::FromStr;

/// Supported export formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// RFC 4180 CSV with header row.
    Csv,
    /// JSON Lines (one JSON object per line).
    Jsonl,
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "jsonl" => Ok(ExportFormat::Jsonl),
            other => Err(format!("unknown export format '{other}' (expected csv|jsonl)")),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct VerdictExportRow {
    pub scenario: String,
    pub outcome: String,
    pub reason: String,
    pub elapsed_ms: u64,
    pub actual_rows: Option<u64>,
    pub estimated_rows: Option<u64>,
    pub buffer_hits: Option<u64>,
    pub buffer_reads: Option<u64>,
    pub external_sort_detected: Option<bool>,
    pub execution_time_ms: Option<f64>,
    pub started_at: String,
}

pub struct ExportUseCase;

impl ExportUseCase {
    pub fn export_report(report: &Report, format: ExportFormat) -> anyhow::Result<String> {
        let rows: Vec<VerdictExportRow> = report
            .verdicts
            .iter()
            .map(|v| Self::verdict_to_row(v, &report.started_at))
            .collect();

        match format {
            ExportFormat::Csv => Ok(Self::rows_to_csv(&rows)),
            ExportFormat::Jsonl => Self::rows_to_jsonl(&rows),
        }
    }

    fn verdict_to_row(v: &Verdict, started_at: &str) -> VerdictExportRow {
        let facts = v.facts.as_ref();
        VerdictExportRow {
            scenario: v.scenario.clone(),
            outcome: v.outcome.as_str().to_string(),
            reason: v.reason.clone(),
            elapsed_ms: v.elapsed_ms,
            actual_rows: facts.and_then(|f| f.actual_rows),
            estimated_rows: facts.and_then(|f| f.estimated_rows),
            buffer_hits: facts.and_then(|f| f.buffer_hits),
            buffer_reads: facts.and_then(|f| f.buffer_reads),
            external_sort_detected: facts.map(|f| f.external_sort_detected),
            execution_time_ms: facts.and_then(|f| f.execution_time_ms),
            started_at: started_at.to_string(),
        }
    }

    fn rows_to_csv(rows: &[VerdictExportRow]) -> String {
        let mut output = String::new();

        output.push_str("scenario,outcome,reason,elapsed_ms,actual_rows,estimated_rows,buffer_hits,buffer_reads,external_sort_detected,execution_time_ms,started_at\n");

        for row in rows {
            let fields = [
                csv_escape(&row.scenario),
                csv_escape(&row.outcome),
                csv_escape(&row.reason),
                row.elapsed_ms.to_string(),
                opt(row.actual_rows),
                opt(row.estimated_rows),
                opt(row.buffer_hits),
                opt(row.buffer_reads),
                opt(row.external_sort_detected),
                row.execution_time_ms
                    .map_or(String::new(), |v| format!("{v:.3}")),
                csv_escape(&row.started_at),
            ];
            output.push_str(&fields.join(","));
            output.push('\n');
        }

        output
    }

    fn rows_to_jsonl(rows: &[VerdictExportRow]) -> anyhow::Result<String> {
        let mut output = String::new();
        for row in rows {
            output.push_str(&serde_json::to_string(row)?);
            output.push('\n');
        }
        Ok(output)
    }
}

fn opt<T: ToString>(v: Option<T>) -> String {
    v.map_or(String::new(), |v| v.to_string())
}

/// Quote a field if it contains a comma, quote, or line break.
fn csv_escape(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}
