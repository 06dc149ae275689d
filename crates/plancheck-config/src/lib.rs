//! Scenario file loading and validation.
//!
//! The file is TOML (`[defaults]`, `[connection]`, `[[scenario]]`). Loading is
//! split from resolution so `plancheck validate` can stop after the checks and
//! tests can inject the environment.

use anyhow::Context;
use plancheck_types::{ConfigFile, ConnectionConfig, Predicate, Scenario};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_PARALLEL: usize = 1;
pub const DEFAULT_OUTPUT_CAP_BYTES: usize = 64 * 1024;

/// Checked before `DATABASE_URL`.
pub const DATABASE_URL_ENV: &str = "PLANCHECK_DATABASE_URL";

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("no scenarios defined")]
    NoScenarios,

    #[error("scenario #{0} has an empty name")]
    EmptyName(usize),

    #[error("duplicate scenario name '{0}'")]
    DuplicateName(String),

    #[error("scenario '{0}' has an empty query")]
    EmptyQuery(String),

    #[error("scenario '{scenario}': {message}")]
    InvalidPredicate { scenario: String, message: String },

    #[error("invalid duration '{value}': {message}")]
    InvalidDuration { value: String, message: String },

    #[error("parallel must be at least 1")]
    InvalidParallel,

    #[error("output_cap_bytes must be at least 1")]
    InvalidOutputCap,

    #[error("unknown scenario '{0}'")]
    UnknownScenario(String),

    #[error("invalid connection url: {0}")]
    InvalidConnectionUrl(String),
}

/// Command-line overrides applied on top of the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub timeout: Option<Duration>,
    pub parallel: Option<usize>,
    pub database_url: Option<String>,

    /// Run only these scenarios (declaration order is kept).
    pub only: Vec<String>,
}

/// Everything a run needs, with defaults filled in.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub scenarios: Vec<Scenario>,
    pub timeout: Duration,
    pub parallel: usize,
    pub output_cap_bytes: usize,
    pub connection: ConnectionConfig,
}

pub fn load_config_file(path: &Path) -> anyhow::Result<ConfigFile> {
    let text = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let config: ConfigFile =
        toml::from_str(&text).with_context(|| format!("parse toml {}", path.display()))?;
    Ok(config)
}

pub fn validate_config(config: &ConfigFile) -> Result<(), ConfigError> {
    if config.scenarios.is_empty() {
        return Err(ConfigError::NoScenarios);
    }

    let mut names = BTreeSet::new();
    for (i, scenario) in config.scenarios.iter().enumerate() {
        if scenario.name.trim().is_empty() {
            return Err(ConfigError::EmptyName(i + 1));
        }
        if !names.insert(scenario.name.as_str()) {
            return Err(ConfigError::DuplicateName(scenario.name.clone()));
        }
        if scenario.query.trim().trim_end_matches(';').trim().is_empty() {
            return Err(ConfigError::EmptyQuery(scenario.name.clone()));
        }
        validate_predicate(&scenario.expect).map_err(|message| ConfigError::InvalidPredicate {
            scenario: scenario.name.clone(),
            message,
        })?;
    }

    if let Some(timeout) = &config.defaults.timeout {
        parse_timeout(timeout)?;
    }
    if config.defaults.parallel == Some(0) {
        return Err(ConfigError::InvalidParallel);
    }
    if config.defaults.output_cap_bytes == Some(0) {
        return Err(ConfigError::InvalidOutputCap);
    }
    if let Some(url) = &config.connection.url {
        check_url(url)?;
    }
    Ok(())
}

fn validate_predicate(p: &Predicate) -> Result<(), String> {
    match p {
        Predicate::MustContainOperator { operator }
        | Predicate::MustNotContainOperator { operator } => {
            if operator.trim().is_empty() {
                return Err("operator must not be empty".to_string());
            }
        }
        Predicate::MustContainText { text } | Predicate::MustNotContainText { text } => {
            if text.trim().is_empty() {
                return Err("text must not be empty".to_string());
            }
        }
        Predicate::RowEstimateWithinFactor { max_ratio } => {
            if !max_ratio.is_finite() || *max_ratio < 1.0 {
                return Err(format!("max_ratio must be >= 1, got {max_ratio}"));
            }
        }
        Predicate::ExecutionTimeBelow { max_ms } => {
            if !max_ms.is_finite() || *max_ms <= 0.0 {
                return Err(format!("max_ms must be > 0, got {max_ms}"));
            }
        }
        Predicate::BufferHitRatioAtLeast { min_ratio } => {
            if !(0.0..=1.0).contains(min_ratio) {
                return Err(format!("min_ratio must be within [0, 1], got {min_ratio}"));
            }
        }
        Predicate::CompositeAnd { of } => {
            for child in of {
                validate_predicate(child)?;
            }
        }
    }
    Ok(())
}

/// Validate, then merge file, overrides, and environment.
pub fn resolve_config(
    config: ConfigFile,
    overrides: Overrides,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ResolvedConfig, ConfigError> {
    validate_config(&config)?;

    let timeout = match (overrides.timeout, &config.defaults.timeout) {
        (Some(t), _) => t,
        (None, Some(s)) => parse_timeout(s)?,
        (None, None) => DEFAULT_TIMEOUT,
    };
    if timeout.is_zero() {
        return Err(ConfigError::InvalidDuration {
            value: "0s".to_string(),
            message: "timeout must be greater than zero".to_string(),
        });
    }

    let parallel = overrides
        .parallel
        .or(config.defaults.parallel)
        .unwrap_or(DEFAULT_PARALLEL);
    if parallel == 0 {
        return Err(ConfigError::InvalidParallel);
    }

    let output_cap_bytes = config
        .defaults
        .output_cap_bytes
        .unwrap_or(DEFAULT_OUTPUT_CAP_BYTES);

    let mut connection = config.connection;
    let url_override = overrides
        .database_url
        .or_else(|| env(DATABASE_URL_ENV))
        .or_else(|| env("DATABASE_URL"));
    if let Some(url) = url_override {
        check_url(&url)?;
        connection.url = Some(url);
    }

    let scenarios = select_scenarios(config.scenarios, &overrides.only)?;

    Ok(ResolvedConfig {
        scenarios,
        timeout,
        parallel,
        output_cap_bytes,
        connection,
    })
}

fn select_scenarios(all: Vec<Scenario>, only: &[String]) -> Result<Vec<Scenario>, ConfigError> {
    if only.is_empty() {
        return Ok(all);
    }
    for name in only {
        if !all.iter().any(|s| &s.name == name) {
            return Err(ConfigError::UnknownScenario(name.clone()));
        }
    }
    Ok(all.into_iter().filter(|s| only.contains(&s.name)).collect())
}

/// Bare integers are seconds; anything else goes through humantime ("90s", "2m").
pub fn parse_timeout(s: &str) -> Result<Duration, ConfigError> {
    let s = s.trim();
    if let Ok(secs) = s.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    humantime::parse_duration(s).map_err(|e| ConfigError::InvalidDuration {
        value: s.to_string(),
        message: e.to_string(),
    })
}

fn check_url(raw: &str) -> Result<(), ConfigError> {
    let url = url::Url::parse(raw).map_err(|e| ConfigError::InvalidConnectionUrl(e.to_string()))?;
    match url.scheme() {
        "postgres" | "postgresql" => Ok(()),
        other => Err(ConfigError::InvalidConnectionUrl(format!(
            "unsupported scheme '{other}' (expected postgres or postgresql)"
        ))),
    }
}

/// Human-readable target with the password masked, for logs and `validate`.
pub fn describe_connection(conn: &ConnectionConfig) -> String {
    if let Some(raw) = &conn.url {
        return match url::Url::parse(raw) {
            Ok(mut url) => {
                if url.password().is_some() {
                    let _ = url.set_password(Some("***"));
                }
                url.to_string()
            }
            Err(_) => "<invalid url>".to_string(),
        };
    }

    let field = |v: Option<String>| v.unwrap_or_else(|| "<PG default>".to_string());
    format!(
        "host={} port={} dbname={} user={}",
        field(conn.host.clone()),
        field(conn.port.map(|p| p.to_string())),
        field(conn.database.clone()),
        field(conn.user.clone()),
    )
}
