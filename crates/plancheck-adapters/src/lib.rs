//! PostgreSQL adapters for plancheck.
//!
//! In clean-arch terms: this is where we touch the world.

use async_trait::async_trait;
use plancheck_types::{ConnectionConfig, Scenario};
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::{Connection, Executor, Row};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};

pub const APPLICATION_NAME: &str = "plancheck";

/// SQLSTATE `query_canceled`, raised when `statement_timeout` fires.
pub const QUERY_CANCELED: &str = "57014";

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("statement failed: {statement}: {message}")]
    Statement { statement: String, message: String },

    /// The server cancelled a statement that outlived the scenario timeout.
    #[error("statement timed out: {statement}")]
    Timeout { statement: String, message: String },
}

/// Runs one scenario on its own session and returns the raw plan text.
#[async_trait]
pub trait SessionRunner: Send + Sync {
    /// Cheap round-trip proving the engine is reachable.
    async fn ping(&self) -> Result<(), SessionError>;

    /// Run setup then `EXPLAIN` on a fresh session. `timeout` bounds every
    /// statement on the server side, so nothing outlives the scenario.
    async fn run(&self, scenario: &Scenario, timeout: Duration) -> Result<String, SessionError>;
}

/// `SessionRunner` backed by one fresh `sqlx` connection per scenario.
///
/// A fresh session is what gives every scenario the server's default
/// parameter baseline: `SET` never leaks between scenarios.
#[derive(Debug, Clone)]
pub struct PgSessionRunner {
    options: PgConnectOptions,
    output_cap_bytes: usize,
}

impl PgSessionRunner {
    pub fn new(options: PgConnectOptions, output_cap_bytes: usize) -> Self {
        Self {
            options,
            output_cap_bytes,
        }
    }

    pub fn from_config(
        conn: &ConnectionConfig,
        output_cap_bytes: usize,
    ) -> Result<Self, SessionError> {
        Ok(Self::new(connect_options(conn)?, output_cap_bytes))
    }

    async fn connect(&self) -> Result<PgConnection, SessionError> {
        PgConnection::connect_with(&self.options)
            .await
            .map_err(|e| SessionError::Connection(e.to_string()))
    }
}

#[async_trait]
impl SessionRunner for PgSessionRunner {
    async fn ping(&self) -> Result<(), SessionError> {
        let mut conn = self.connect().await?;
        let result = (&mut conn)
            .execute(sqlx::raw_sql("SELECT 1"))
            .await
            .map(|_| ())
            .map_err(|e| SessionError::Connection(e.to_string()));
        release(conn).await;
        result
    }

    async fn run(&self, scenario: &Scenario, timeout: Duration) -> Result<String, SessionError> {
        let mut conn = self.connect().await?;
        let result = execute_scenario(&mut conn, scenario, timeout).await;
        release(conn).await;
        result.map(|plan| truncate(plan, self.output_cap_bytes))
    }
}

/// Build connect options: `url` wins; otherwise discrete fields over libpq `PG*` defaults.
pub fn connect_options(conn: &ConnectionConfig) -> Result<PgConnectOptions, SessionError> {
    let mut options = match &conn.url {
        Some(url) => PgConnectOptions::from_str(url)
            .map_err(|e| SessionError::Connection(format!("invalid connection url: {e}")))?,
        None => {
            let mut options = PgConnectOptions::new();
            if let Some(host) = &conn.host {
                options = options.host(host);
            }
            if let Some(port) = conn.port {
                options = options.port(port);
            }
            if let Some(database) = &conn.database {
                options = options.database(database);
            }
            if let Some(user) = &conn.user {
                options = options.username(user);
            }
            if let Some(password) = &conn.password {
                options = options.password(password);
            }
            options
        }
    };
    options = options.application_name(APPLICATION_NAME);
    Ok(options)
}

async fn execute_scenario(
    conn: &mut PgConnection,
    scenario: &Scenario,
    timeout: Duration,
) -> Result<String, SessionError> {
    let limit = statement_timeout_statement(timeout);
    execute(conn, &limit).await?;

    for statement in &scenario.setup {
        debug!(scenario = %scenario.name, %statement, "setup");
        execute(conn, statement).await?;
    }

    let explain = explain_statement(&scenario.query, scenario.analyze);
    debug!(scenario = %scenario.name, statement = %explain, "explain");
    if !scenario.analyze {
        return fetch_plan(conn, &explain).await;
    }

    // ANALYZE executes the query; roll back whatever it wrote.
    let mut tx = conn
        .begin()
        .await
        .map_err(|e| statement_error("BEGIN", &e))?;
    let plan = fetch_plan(&mut tx, &explain).await;
    let rolled_back = tx
        .rollback()
        .await
        .map_err(|e| statement_error("ROLLBACK", &e));
    let plan = plan?;
    rolled_back?;
    Ok(plan)
}

async fn execute(conn: &mut PgConnection, statement: &str) -> Result<(), SessionError> {
    (&mut *conn)
        .execute(sqlx::raw_sql(statement))
        .await
        .map(|_| ())
        .map_err(|e| statement_error(statement, &e))
}

async fn fetch_plan(conn: &mut PgConnection, explain: &str) -> Result<String, SessionError> {
    let rows = (&mut *conn)
        .fetch_all(sqlx::raw_sql(explain))
        .await
        .map_err(|e| statement_error(explain, &e))?;

    let mut lines = Vec::with_capacity(rows.len());
    for row in &rows {
        let line: String = row
            .try_get(0)
            .map_err(|e| statement_error(explain, &e))?;
        lines.push(line);
    }
    Ok(lines.join("\n"))
}

async fn release(conn: PgConnection) {
    if let Err(err) = conn.close().await {
        warn!(error = %err, "closing session failed");
    }
}

/// Session-level `statement_timeout` matching the scenario timeout.
///
/// Clamped to `1..=i32::MAX` ms: zero would disable the limit.
pub fn statement_timeout_statement(timeout: Duration) -> String {
    let ms = timeout.as_millis().clamp(1, i32::MAX as u128);
    format!("SET statement_timeout = {ms}")
}

/// Wrap `query` in a textual `EXPLAIN`.
pub fn explain_statement(query: &str, analyze: bool) -> String {
    let query = query.trim().trim_end_matches(';').trim_end();
    if analyze {
        format!("EXPLAIN (ANALYZE, BUFFERS, FORMAT TEXT) {query}")
    } else {
        format!("EXPLAIN (FORMAT TEXT) {query}")
    }
}

fn statement_error(statement: &str, err: &sqlx::Error) -> SessionError {
    match err.as_database_error() {
        Some(db) => database_error(statement, db.message(), db.code().as_deref()),
        None => SessionError::Statement {
            statement: statement.to_string(),
            message: err.to_string(),
        },
    }
}

fn database_error(statement: &str, message: &str, code: Option<&str>) -> SessionError {
    let statement = statement.to_string();
    match code {
        Some(QUERY_CANCELED) => SessionError::Timeout {
            statement,
            message: format!("{message} (SQLSTATE {QUERY_CANCELED})"),
        },
        Some(code) => SessionError::Statement {
            statement,
            message: format!("{message} (SQLSTATE {code})"),
        },
        None => SessionError::Statement {
            statement,
            message: message.to_string(),
        },
    }
}

/// Cap `text` at `cap` bytes without splitting a UTF-8 character.
fn truncate(mut text: String, cap: usize) -> String {
    if text.len() > cap {
        let mut end = cap;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        text.truncate(end);
    }
    text
}
