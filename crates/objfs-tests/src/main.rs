use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::Parser;
use objfs_engine::LocalEngine;
use objfs_tests::{standard_scenarios, RunConfiguration, ScenarioRunner, SessionManager};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Conformance and latency checks for an object-store-backed filesystem.
#[derive(Debug, Parser)]
#[command(name = "objfs-conform", version, about)]
struct Cli {
    /// Run configuration (.toml or .json)
    #[arg(short, long, env = "OBJFS_CONFIG", required_unless_present = "list")]
    config: Option<PathBuf>,

    /// Run only this scenario (repeatable)
    #[arg(short, long = "scenario", value_name = "NAME")]
    scenarios: Vec<String>,

    /// Write the JSON report here
    #[arg(long, value_name = "PATH")]
    json: Option<PathBuf>,

    /// Write a JUnit XML report here
    #[arg(long, value_name = "PATH")]
    junit: Option<PathBuf>,

    /// List scenarios and exit
    #[arg(long)]
    list: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(cli.log_json.then(|| fmt::layer().json().with_writer(std::io::stderr)))
        .with((!cli.log_json).then(|| fmt::layer().with_writer(std::io::stderr)))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let scenarios = standard_scenarios();

    if cli.list {
        for scenario in &scenarios {
            if scenario.required_options().is_empty() {
                println!("{}", scenario.name());
            } else {
                println!(
                    "{} (requires {})",
                    scenario.name(),
                    scenario.required_options().join(", ")
                );
            }
        }
        return Ok(ExitCode::SUCCESS);
    }

    let unknown: Vec<&str> = cli
        .scenarios
        .iter()
        .filter(|name| !scenarios.iter().any(|s| s.name() == name.as_str()))
        .map(String::as_str)
        .collect();
    if !unknown.is_empty() {
        bail!("unknown scenario(s): {}", unknown.join(", "));
    }

    let Some(config_path) = cli.config else {
        bail!("--config is required");
    };
    let config = RunConfiguration::from_file(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    let engine = LocalEngine::new(config.engine_config()?)?;
    let sessions = SessionManager::new(config);

    tracing::info!(config = %config_path.display(), "objfs-conform starting");
    let report = ScenarioRunner::new(&sessions, &engine)
        .with_filter(cli.scenarios)
        .run(&scenarios);

    for line in report.lines() {
        println!("{line}");
    }
    println!("{}", report.summary_line());

    if let Some(path) = cli.json {
        std::fs::write(&path, report.to_json()?)
            .with_context(|| format!("writing {}", path.display()))?;
    }
    if let Some(path) = cli.junit {
        std::fs::write(&path, report.to_junit_xml())
            .with_context(|| format!("writing {}", path.display()))?;
    }

    Ok(if report.is_passing() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
