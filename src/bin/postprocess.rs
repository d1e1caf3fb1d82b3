// src/bin/postprocess.rs - Equilibrium summary table for a directory of snapshots

use clap::Parser;
use ecpn::snapshot::{list_snapshots, Snapshot};
use ecpn::statistics::{analyze, write_summary, AnalysisConfig, SummaryHeader};
use ecpn::utils::rng::run_rng;
use std::io;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Cli {
    /// Directory holding the snapshots of one network size
    path: PathBuf,

    /// Equilibration time; samples with t <= t_eq are discarded
    t_eq: f64,

    /// Bootstrap resamples
    #[arg(long, default_value_t = 32)]
    resamples: usize,

    /// Seed for the bootstrap RNG
    #[arg(long, default_value_t = 0)]
    seed: u64,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = AnalysisConfig { t_eq: cli.t_eq, resamples: cli.resamples };

    let mut rows = Vec::new();
    for (idx, file) in list_snapshots(&cli.path)?.iter().enumerate() {
        let snapshot = Snapshot::load(file)?;
        let mut rng = run_rng(cli.seed, idx);
        let analysis = analyze(&snapshot, &cfg, &mut rng)?;
        info!(file = %file.display(), samples = analysis.samples, binder = analysis.binder, "analyzed");
        rows.push(analysis.row);
    }

    let header = SummaryHeader {
        script: std::env::args().next().unwrap_or_else(|| "postprocess".into()),
        data_path: cli.path.display().to_string(),
        t_eq: cli.t_eq,
        timestamp: chrono::Utc::now(),
    };
    write_summary(io::stdout().lock(), &header, &rows)?;
    Ok(())
}
