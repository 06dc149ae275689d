use plancheck_config::{Overrides, load_config_file, resolve_config, validate_config};
use plancheck_types::Predicate;
use std::path::PathBuf;

fn demo_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("demos")
        .join("plancheck.toml")
}

#[test]
fn demo_scenario_file_is_valid() {
    let cfg = load_config_file(&demo_path()).expect("demo file loads");
    validate_config(&cfg).expect("demo file validates");
    assert!(cfg.scenarios.len() >= 2);
}

#[test]
fn demo_file_contains_the_work_mem_pair() {
    let cfg = load_config_file(&demo_path()).expect("demo file loads");
    let spill = cfg
        .scenarios
        .iter()
        .find(|s| s.setup.iter().any(|st| st.contains("'1MB'")))
        .expect("a 1MB work_mem scenario");
    let roomy = cfg
        .scenarios
        .iter()
        .find(|s| s.setup.iter().any(|st| st.contains("'256MB'")))
        .expect("a 256MB work_mem scenario");

    assert_eq!(spill.query, roomy.query);
    assert_eq!(spill.expect, Predicate::contains("external merge"));
    assert_eq!(roomy.expect, Predicate::not_contains("external merge"));
}

#[test]
fn demo_file_resolves_with_env_url() {
    let cfg = load_config_file(&demo_path()).expect("demo file loads");
    let resolved = resolve_config(cfg, Overrides::default(), |key| {
        (key == "DATABASE_URL").then(|| "postgres://postgres@localhost/postgres".to_string())
    })
    .expect("demo file resolves");
    assert_eq!(
        resolved.connection.url.as_deref(),
        Some("postgres://postgres@localhost/postgres")
    );
    assert_eq!(resolved.parallel, 1);
}
