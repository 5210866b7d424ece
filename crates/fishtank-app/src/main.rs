use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use fishtank_app::{Overrides, load_config, run};
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "fishtank",
    version,
    about = "Run the evolving fishtank simulation headless"
)]
struct Cli {
    /// JSON configuration file; missing fields fall back to defaults.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of simulation steps to run.
    #[arg(long, default_value_t = 1_000)]
    steps: u64,

    /// RNG seed for a reproducible run.
    #[arg(long)]
    seed: Option<u64>,

    /// Worker threads evaluating fish networks.
    #[arg(long)]
    workers: Option<usize>,

    /// Per-step deadline for worker batches, in milliseconds.
    #[arg(long)]
    step_timeout_ms: Option<u64>,

    /// Write a JSON run report to this path.
    #[arg(long)]
    report: Option<PathBuf>,

    /// Print the resolved configuration as JSON and exit.
    #[arg(long)]
    print_config: bool,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    Overrides {
        seed: cli.seed,
        workers: cli.workers,
        step_timeout_ms: cli.step_timeout_ms,
    }
    .apply(&mut config);
    config.validate().context("invalid configuration")?;

    if cli.print_config {
        println!(
            "{}",
            serde_json::to_string_pretty(&config).context("failed to format configuration")?
        );
        return Ok(());
    }

    let report = run(config, cli.steps)?;
    if let Some(path) = cli.report.as_deref() {
        report
            .write_json(path)
            .with_context(|| format!("failed to write run report to {}", path.display()))?;
        info!(path = %path.display(), "run report written");
    }
    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
