use anyhow::Context;
use clap::{Parser, Subcommand};
use schemars::schema_for;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Parser)]
#[command(name = "xtask", about = "Repo automation for plancheck")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// (Re)generate JSON Schemas for the report and the scenario file.
    Schema {
        /// Output directory
        #[arg(long, default_value = "schemas")]
        out_dir: PathBuf,
    },

    /// Check saved reports against the report schema.
    CheckReports {
        /// Report JSON files
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Run the "usual" repo checks (fmt, clippy, test, schema, demo config).
    Ci,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.cmd {
        Command::Schema { out_dir } => cmd_schema(&out_dir),
        Command::CheckReports { files } => cmd_check_reports(&files),
        Command::Ci => cmd_ci(),
    }
}

fn cmd_ci() -> anyhow::Result<()> {
    run("cargo", ["fmt", "--all", "--", "--check"])?;
    run(
        "cargo",
        ["clippy", "--all-targets", "--all-features", "--", "-D", "warnings"],
    )?;
    run("cargo", ["test", "--all"])?;
    run("cargo", ["run", "-p", "xtask", "--", "schema"])?;
    run(
        "cargo",
        [
            "run",
            "-p",
            "plancheck-cli",
            "--",
            "validate",
            "--config",
            "demos/plancheck.toml",
        ],
    )?;
    Ok(())
}

fn run<const N: usize>(bin: &str, args: [&str; N]) -> anyhow::Result<()> {
    let status = std::process::Command::new(bin)
        .args(args)
        .status()
        .with_context(|| format!("running {bin}"))?;
    if !status.success() {
        anyhow::bail!("{bin} failed: {status}");
    }
    Ok(())
}

fn cmd_schema(out_dir: &Path) -> anyhow::Result<()> {
    fs::create_dir_all(out_dir).with_context(|| format!("create dir {}", out_dir.display()))?;

    write_schema(
        out_dir,
        "plancheck.report.v1.schema.json",
        schema_for!(plancheck_types::Report),
    )?;

    write_schema(
        out_dir,
        "plancheck.config.v1.schema.json",
        schema_for!(plancheck_types::ConfigFile),
    )?;

    Ok(())
}

fn write_schema<T: serde::Serialize>(out_dir: &Path, name: &str, schema: T) -> anyhow::Result<()> {
    let path = out_dir.join(name);
    let json = serde_json::to_vec_pretty(&schema)?;
    fs::write(&path, json).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

fn cmd_check_reports(files: &[PathBuf]) -> anyhow::Result<()> {
    let schema = serde_json::to_value(schema_for!(plancheck_types::Report))?;
    let validator = jsonschema::validator_for(&schema)
        .map_err(|e| anyhow::anyhow!("invalid report schema: {e}"))?;

    let mut bad = 0usize;
    for path in files {
        let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
        let instance: serde_json::Value = serde_json::from_slice(&bytes)
            .with_context(|| format!("parse json {}", path.display()))?;

        let errors: Vec<String> = validator
            .iter_errors(&instance)
            .map(|e| format!("{} at {}", e, e.instance_path))
            .collect();
        if errors.is_empty() {
            println!("ok: {}", path.display());
        } else {
            bad += 1;
            eprintln!("invalid: {}", path.display());
            for e in errors {
                eprintln!("  {e}");
            }
        }
    }

    if bad > 0 {
        anyhow::bail!("{bad} report(s) failed schema validation");
    }
    Ok(())
}
