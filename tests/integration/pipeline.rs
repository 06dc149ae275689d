use plancheck_app::{
    EXIT_FAILED, EXIT_OK, ExportFormat, ExportUseCase, RunScenariosRequest, RunScenariosUseCase,
    SystemClock, exit_code, render_markdown,
};
use plancheck_config::{Overrides, load_config_file, resolve_config};
use plancheck_fake::{FakeResponse, FakeSessionRunner, plans};
use plancheck_types::{Outcome, Report, ToolInfo};
use std::fs;
use std::time::Duration;
use tempfile::tempdir;

const SCENARIOS: &str = r#"
[defaults]
timeout = "2s"
parallel = 2

[[scenario]]
name = "small work_mem spills"
setup = ["SET work_mem = '1MB'"]
query = "SELECT * FROM orders ORDER BY created_at"
expect = { kind = "must_contain_operator", operator = "external merge" }

[[scenario]]
name = "large work_mem sorts in memory"
setup = ["SET work_mem = '256MB'"]
query = "SELECT * FROM orders ORDER BY created_at"
expect = { kind = "must_not_contain_operator", operator = "external merge" }

[[scenario]]
name = "workers launch"
query = "SELECT count(*) FROM events"

[scenario.expect]
kind = "all"
of = [
  { kind = "must_contain_operator", operator = "Parallel Seq Scan" },
  { kind = "must_contain_text", text = "Workers Launched" },
  { kind = "execution_time_below", max_ms = 1000.0 },
]

[[scenario]]
name = "lookup uses index"
query = "SELECT * FROM orders WHERE customer_id = 42"
expect = { kind = "must_contain_operator", operator = "Index Scan" }
"#;

fn tool() -> ToolInfo {
    ToolInfo {
        name: "plancheck".into(),
        version: "test".into(),
    }
}

async fn run(fake: FakeSessionRunner, overrides: Overrides) -> Report {
    let dir = tempdir().expect("failed to create temp dir");
    let path = dir.path().join("plancheck.toml");
    fs::write(&path, SCENARIOS).unwrap();

    let cfg = load_config_file(&path).expect("scenario file loads");
    let resolved = resolve_config(cfg, overrides, |_| None).expect("scenario file resolves");

    RunScenariosUseCase::new(fake, SystemClock, tool())
        .execute(RunScenariosRequest {
            scenarios: resolved.scenarios,
            timeout: resolved.timeout,
            parallel: resolved.parallel,
        })
        .await
}

fn healthy_engine() -> FakeSessionRunner {
    FakeSessionRunner::new()
        .with_plan("small work_mem spills", plans::DISK_SORT)
        .with_plan("large work_mem sorts in memory", plans::IN_MEMORY_SORT)
        .with_plan("workers launch", plans::PARALLEL_AGGREGATE)
        .with_plan("lookup uses index", plans::INDEX_SCAN)
}

#[tokio::test]
async fn all_scenarios_pass_against_healthy_engine() {
    let fake = healthy_engine();
    let report = run(fake.clone(), Overrides::default()).await;

    assert_eq!(report.counts.pass, 4, "{:#?}", report.verdicts);
    assert_eq!(exit_code(&report, true), EXIT_OK);
    assert!(fake.max_in_flight() <= 2);

    let names: Vec<_> = report.verdicts.iter().map(|v| v.scenario.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "small work_mem spills",
            "large work_mem sorts in memory",
            "workers launch",
            "lookup uses index"
        ]
    );

    let workers = report.verdicts[2].facts.as_ref().unwrap();
    assert_eq!(workers.workers_launched, Some(2));
}

#[tokio::test]
async fn only_filter_runs_a_subset() {
    let fake = healthy_engine();
    let report = run(
        fake.clone(),
        Overrides {
            only: vec!["lookup uses index".into()],
            ..Overrides::default()
        },
    )
    .await;

    assert_eq!(report.verdicts.len(), 1);
    assert_eq!(fake.calls(), vec!["lookup uses index".to_string()]);
}

#[tokio::test]
async fn one_regression_fails_the_run_and_shows_in_outputs() {
    let fake = healthy_engine().with_plan("lookup uses index", plans::SEQ_SCAN);
    let report = run(fake, Overrides::default()).await;

    assert_eq!(report.counts.fail, 1);
    assert_eq!(report.verdicts[3].outcome, Outcome::Fail);
    assert_eq!(exit_code(&report, false), EXIT_FAILED);

    let md = render_markdown(&report);
    assert!(md.starts_with("❌ plancheck: fail"));
    assert!(md.contains("Seq Scan on orders"));

    let csv = ExportUseCase::export_report(&report, ExportFormat::Csv).unwrap();
    assert_eq!(csv.lines().count(), 5);
    assert!(csv.lines().any(|l| l.starts_with("lookup uses index,fail,")));
}

#[tokio::test]
async fn cli_timeout_override_beats_file() {
    let fake = healthy_engine().with_response("workers launch", FakeResponse::Hang);
    let report = run(
        fake,
        Overrides {
            timeout: Some(Duration::from_millis(50)),
            ..Overrides::default()
        },
    )
    .await;

    let v = &report.verdicts[2];
    assert_eq!(v.outcome, Outcome::Error);
    assert_eq!(v.reason, "timeout");
    assert!(v.elapsed_ms < 2000, "file timeout of 2s should not apply");
    assert_eq!(report.counts.pass, 3);
}

#[tokio::test]
async fn report_round_trips_through_json() {
    let report = run(healthy_engine(), Overrides::default()).await;
    let json = serde_json::to_string(&report).unwrap();
    let back: Report = serde_json::from_str(&json).unwrap();
    assert_eq!(back.counts, report.counts);
    assert_eq!(back.schema, "plancheck.report.v1");
}
