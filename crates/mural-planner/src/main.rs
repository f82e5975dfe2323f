//! MURAL Planning CLI
//!
//! Validates a run configuration, builds its scenario topology and applies a
//! worth-bin file, then writes a JSON summary.
//!
//! Usage:
//!   mural-plan --config planner.json --worth worth.txt --output summary.json

use anyhow::{Context, Result};
use clap::Parser;
use mural_planner::{load_config, run};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(
    name = "mural-plan",
    about = "Validate a MURAL planning run and summarize its topology and worth profiles"
)]
struct Args {
    /// Path to the planner configuration JSON file
    #[arg(short, long, default_value = "planner.json")]
    config: PathBuf,

    /// Worth-bin file to apportion onto the timeline
    #[arg(short, long)]
    worth: Option<PathBuf>,

    /// Output JSON file (stdout if omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose {
        "mural_planner=debug,link_model=debug,relay_topology=debug,worth_profile=debug"
    } else {
        "mural_planner=info"
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    info!("{}", "=".repeat(60));
    info!("MURAL Planner");
    info!("{}", "=".repeat(60));

    let config = load_config(&args.config)
        .with_context(|| format!("loading configuration {:?}", args.config))?;
    let summary = run(&config, args.worth.as_deref())?;

    match &args.output {
        Some(path) => {
            info!("Writing summary to {:?}", path);
            let file = File::create(path)?;
            let writer = BufWriter::new(file);
            serde_json::to_writer_pretty(writer, &summary)?;
        }
        None => {
            let stdout = io::stdout();
            let mut writer = stdout.lock();
            serde_json::to_writer_pretty(&mut writer, &summary)?;
            writeln!(writer)?;
        }
    }

    info!("{}", "=".repeat(60));
    info!("SUMMARY");
    info!("{}", "=".repeat(60));
    info!("Time steps: {}", summary.timeline.time_steps);
    if let Some(topology) = &summary.topology {
        info!(
            "Relays: {}, links: {}",
            topology.relays.len(),
            topology.links.len()
        );
    }
    if let Some(worth) = &summary.worth {
        info!(
            "Worth: {} bins applied, {:.3} total",
            worth.report.bins_applied, worth.report.worth_applied
        );
    }

    Ok(())
}
