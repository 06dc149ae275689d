use anyhow::Context;
use clap::{Parser, Subcommand};
use plancheck_adapters::PgSessionRunner;
use plancheck_app::{
    EXIT_SETUP, ExportFormat, ExportUseCase, RunScenariosRequest, RunScenariosUseCase,
    SystemClock, exit_code, github_annotations, render_console, render_markdown,
};
use plancheck_config::{
    Overrides, ResolvedConfig, describe_connection, load_config_file, parse_timeout,
    resolve_config,
};
use plancheck_types::{Report, ToolInfo};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Env var holding the tracing filter directive.
const LOG_ENV: &str = "PLANCHECK_LOG";

#[derive(Debug, Parser)]
#[command(
    name = "plancheck",
    version,
    about = "Parameter-sensitivity checks for PostgreSQL query plans"
)]
struct Cli {
    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true, default_value_t = false)]
    log_json: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run scenarios against the database and report verdicts.
    Run {
        /// Scenario file (TOML)
        #[arg(long)]
        config: PathBuf,

        /// Per-scenario timeout: seconds or a duration like "90s"
        #[arg(long, value_parser = parse_timeout)]
        timeout: Option<Duration>,

        /// Max scenarios in flight, each on its own session
        #[arg(long)]
        parallel: Option<usize>,

        /// Overrides every other connection setting
        #[arg(long)]
        database_url: Option<String>,

        /// Run only the named scenario. Repeatable.
        #[arg(long)]
        only: Vec<String>,

        /// Write the JSON report here
        #[arg(long)]
        out: Option<PathBuf>,

        /// Pretty-print JSON
        #[arg(long, default_value_t = false)]
        pretty: bool,

        /// Write a Markdown summary here
        #[arg(long)]
        md: Option<PathBuf>,

        /// Write one row per scenario here
        #[arg(long)]
        export: Option<PathBuf>,

        #[arg(long, default_value = "csv", requires = "export")]
        export_format: ExportFormat,

        /// Print GitHub Actions annotations for warnings and failures
        #[arg(long, default_value_t = false)]
        github_annotations: bool,

        /// Exit 3 when the only problems are warnings
        #[arg(long, default_value_t = false)]
        fail_on_warn: bool,
    },

    /// Load and validate a scenario file without connecting.
    Validate {
        #[arg(long)]
        config: PathBuf,
    },

    /// Render a Markdown summary from a saved report.
    Md {
        #[arg(long)]
        report: PathBuf,

        /// Output markdown path (default: stdout)
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match real_main(cli).await {
        Ok(code) => ExitCode::from(code as u8),
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(EXIT_SETUP as u8)
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    // Only fails if a subscriber is already installed.
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

async fn real_main(cli: Cli) -> anyhow::Result<i32> {
    match cli.cmd {
        Command::Run {
            config,
            timeout,
            parallel,
            database_url,
            only,
            out,
            pretty,
            md,
            export,
            export_format,
            github_annotations: annotations,
            fail_on_warn,
        } => {
            let resolved = load_and_resolve(
                &config,
                Overrides {
                    timeout,
                    parallel,
                    database_url,
                    only,
                },
            )?;
            tracing::info!(
                connection = %describe_connection(&resolved.connection),
                scenarios = resolved.scenarios.len(),
                "config loaded"
            );

            let runner = PgSessionRunner::from_config(&resolved.connection, resolved.output_cap_bytes)
                .context("invalid connection settings")?;
            let usecase = RunScenariosUseCase::new(runner, SystemClock, tool_info());
            usecase.check_connection().await.with_context(|| {
                format!("connecting to {}", describe_connection(&resolved.connection))
            })?;

            let report = usecase
                .execute(RunScenariosRequest {
                    scenarios: resolved.scenarios,
                    timeout: resolved.timeout,
                    parallel: resolved.parallel,
                })
                .await;

            print!("{}", render_console(&report));

            if let Some(path) = out {
                write_json(&path, &report, pretty)?;
            }
            if let Some(path) = md {
                write_text(&path, &render_markdown(&report))?;
            }
            if let Some(path) = export {
                let content = ExportUseCase::export_report(&report, export_format)?;
                write_text(&path, &content)?;
            }
            if annotations {
                for line in github_annotations(&report) {
                    println!("{line}");
                }
            }

            Ok(exit_code(&report, fail_on_warn))
        }

        Command::Validate { config } => {
            let resolved = load_and_resolve(&config, Overrides::default())?;
            println!(
                "ok: {} scenario(s), timeout {}s, parallel {}",
                resolved.scenarios.len(),
                resolved.timeout.as_secs(),
                resolved.parallel
            );
            for s in &resolved.scenarios {
                println!("  - {}", s.name);
            }
            println!("connection: {}", describe_connection(&resolved.connection));
            Ok(0)
        }

        Command::Md { report, out } => {
            let report: Report = read_json(&report)?;
            let md = render_markdown(&report);

            match out {
                Some(path) => write_text(&path, &md)?,
                None => print!("{md}"),
            }

            Ok(0)
        }
    }
}

fn load_and_resolve(path: &Path, overrides: Overrides) -> anyhow::Result<ResolvedConfig> {
    let file = load_config_file(path)?;
    let resolved = resolve_config(file, overrides, |key| std::env::var(key).ok())
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(resolved)
}

fn tool_info() -> ToolInfo {
    ToolInfo {
        name: "plancheck".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    let v =
        serde_json::from_slice(&bytes).with_context(|| format!("parse json {}", path.display()))?;
    Ok(v)
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T, pretty: bool) -> anyhow::Result<()> {
    let bytes = if pretty {
        serde_json::to_vec_pretty(value)?
    } else {
        serde_json::to_vec(value)?
    };
    atomic_write(path, &bytes)
}

fn write_text(path: &Path, text: &str) -> anyhow::Result<()> {
    atomic_write(path, text.as_bytes())
}

fn atomic_write(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    use std::io::Write;

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => {
            fs::create_dir_all(p).with_context(|| format!("create dir {}", p.display()))?;
            p
        }
        _ => Path::new("."),
    };
    let mut tmp = parent.to_path_buf();
    tmp.push(format!(".{}.tmp", uuid::Uuid::new_v4()));

    {
        let mut f =
            fs::File::create(&tmp).with_context(|| format!("create temp {}", tmp.display()))?;
        f.write_all(bytes)
            .with_context(|| format!("write temp {}", tmp.display()))?;
        f.sync_all().ok();
    }

    fs::rename(&tmp, path)
        .with_context(|| format!("rename {} -> {}", tmp.display(), path.display()))?;
    Ok(())
}
