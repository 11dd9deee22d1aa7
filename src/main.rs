use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Builder;
use log::{debug, error, info, warn, LevelFilter};
use packing_analysis::{analyze_run, load_run, write_report};
use packing_common::AnalysisConfig;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Command-line arguments for the packing analyzer
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory holding `<run>.json` and `<run>.metadata.json`
    #[arg(short, long)]
    src_dir: PathBuf,

    /// Run names to analyze (repeatable)
    #[arg(short, long = "run", required = true)]
    runs: Vec<String>,

    /// Path to the analysis.toml file
    #[arg(short, long, default_value = "analysis.toml")]
    config: PathBuf,

    /// Directory for reports and curve tables
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Worker threads (defaults to the number of cores)
    #[arg(long)]
    threads: Option<usize>,
}

fn load_config(path: &Path) -> Result<AnalysisConfig> {
    if path.exists() {
        AnalysisConfig::load(path)
    } else {
        warn!("Config file '{}' not found. Using defaults.", path.display());
        Ok(AnalysisConfig::default())
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    Builder::from_default_env()
        .filter(None, LevelFilter::Info)
        .parse_default_env()
        .init();

    info!("Starting Packing Analysis...");
    info!("Source directory: {}", args.src_dir.display());
    info!("Output directory: {}", args.output_dir.display());

    let config = load_config(&args.config)?;
    debug!("Analysis configuration: {:#?}", config);

    if let Some(threads) = args.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("Failed to configure the Rayon thread pool")?;
    }
    info!("Using {} Rayon threads.", rayon::current_num_threads());

    std::fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("Failed to create output directory '{}'", args.output_dir.display()))?;

    let start_time = Instant::now();
    let failures: usize = args
        .runs
        .par_iter()
        .enumerate()
        .map(|(index, name)| {
            let result = load_run(&args.src_dir, name, index, &config).and_then(|run| {
                let report = analyze_run(&run, &config);
                info!(
                    "Run '{}': {} frames analyzed, {} skipped, {} past the density cutoff.",
                    name,
                    report.summaries.len(),
                    report.frames_skipped,
                    report.frames_truncated
                );
                write_report(&report, &args.output_dir, &config)
            });
            match result {
                Ok(_) => 0,
                Err(e) => {
                    error!("Run '{}' failed: {:#}", name, e);
                    1
                }
            }
        })
        .sum();

    let total_duration = start_time.elapsed();
    info!(
        "Analyzed {} runs ({} failed) in {:.3} seconds.",
        args.runs.len(),
        failures,
        total_duration.as_secs_f64()
    );
    if failures == args.runs.len() {
        anyhow::bail!("Every run failed.");
    }

    info!("Analysis Complete.");
    Ok(())
}
