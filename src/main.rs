//! # Butterfly-quality CLI
//!
//! Replays per-worker quality event logs from a routing graph build, folds
//! them into one global aggregate and reports it:
//!   butterfly-quality build/quality-*.ndjson
//!   butterfly-quality worker-0.ndjson worker-1.ndjson --top 10
//!   butterfly-quality build/quality-*.ndjson --json quality.json

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use butterfly_quality::pipeline::aggregate_logs;

#[derive(Parser)]
#[command(name = "butterfly-quality")]
#[command(about = "Aggregate and report data-quality signals from a routing graph build", long_about = None)]
struct Cli {
    /// Per-worker event logs (NDJSON, one quality event per line)
    #[arg(value_name = "EVENT_LOG", required = true)]
    logs: Vec<PathBuf>,

    /// Bound on duplicate-way records and sampled way ids per issue (0 = no bound)
    #[arg(long, default_value_t = 25)]
    top: usize,

    /// Write a machine-readable JSON summary to this path
    #[arg(long, value_name = "PATH")]
    json: Option<PathBuf>,

    /// Worker threads for log replay (0 = one per core)
    #[arg(short, long, default_value_t = 0)]
    threads: usize,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("❌ Error: {e:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    // Reports go to stderr so a piped JSON summary stays clean
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    if cli.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(cli.threads)
            .build_global()
            .context("Failed to size the worker thread pool")?;
    }

    let quality = aggregate_logs(&cli.logs)?;
    quality.log_statistics();
    quality.log_issues(cli.top);

    if let Some(path) = cli.json {
        let summary = serde_json::to_string_pretty(&quality.summary_json())?;
        std::fs::write(&path, summary)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("✓ Wrote {}", path.display());
    }

    Ok(())
}
