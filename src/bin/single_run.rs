// src/bin/single_run.rs - Simulate one equal-coupling photonic network

use clap::Parser;
use ecpn::coupling::CouplingSpec;
use ecpn::run::{run_single, RunParameters};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Cli {
    /// Number of modes
    n: usize,

    /// Target energy density
    h0: f64,

    #[arg(long, default_value_t = 1.2)]
    j0: f64,

    #[arg(long, default_value_t = 0.0)]
    sigma: f64,

    /// Relative interaction range; selects the structured ring topology
    #[arg(long)]
    range: Option<f64>,

    #[arg(long, default_value_t = 1.0)]
    chi: f64,

    #[arg(long, default_value_t = 1e-3)]
    dh: f64,

    #[arg(long, default_value_t = 0.0)]
    t_min: f64,

    #[arg(long, default_value_t = 1e6)]
    t_max: f64,

    #[arg(long, default_value_t = 100_001)]
    nt: usize,

    #[arg(long, default_value_t = 100)]
    log_every: usize,

    #[arg(long, default_value_t = 1_000_000)]
    max_iterations: usize,

    /// Seed (defaults to the current UNIX time)
    #[arg(long)]
    seed: Option<u64>,

    /// Output root for data_N*/ and logs_N*/
    #[arg(long, default_value = ".")]
    out: PathBuf,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let seed = match cli.seed {
        Some(s) => s,
        None => SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs(),
    };
    let coupling = match cli.range {
        Some(range) => CouplingSpec::Structured { j0: cli.j0, range },
        None => CouplingSpec::Disordered { j0: cli.j0, sigma: cli.sigma },
    };

    let params = RunParameters {
        n: cli.n,
        h0: cli.h0,
        coupling,
        chi: cli.chi,
        dh: cli.dh,
        seed,
        t_min: cli.t_min,
        t_max: cli.t_max,
        nt: cli.nt,
        log_every: cli.log_every,
        max_iterations: cli.max_iterations,
        ..RunParameters::default()
    };

    let outcome = run_single(&params, &cli.out, BTreeMap::new())?;
    println!("Run complete → {}", outcome.snapshot_path.display());
    Ok(())
}
