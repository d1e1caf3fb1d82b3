//! Sweep over target energy densities for one network size
//! (see `Cli` below for all run parameters).
//!
//! Every run is independent: it owns its RNG, coupling matrix and
//! trajectory, and leaves a snapshot under `<out>/data_N{n}/`.

use clap::Parser;
use ecpn::coupling::CouplingSpec;
use ecpn::run::{run_single, RunOutcome, RunParameters};
use ecpn::utils::rng::derive_seed;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde_json::json;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Cli {
    /// Number of modes
    #[arg(long, default_value_t = 12)]
    n: usize,

    /// Lowest target energy density
    #[arg(long, default_value_t = 0.6)]
    h0_min: f64,

    /// Highest target energy density
    #[arg(long, default_value_t = 0.9)]
    h0_max: f64,

    /// Number of evenly spaced targets (endpoints included)
    #[arg(long, default_value_t = 13)]
    h0_count: usize,

    /// Uniform coupling strength J0
    #[arg(long, default_value_t = 1.2)]
    j0: f64,

    /// Disorder strength; ignored with --range
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

    /// Master seed; per-run seeds are derived from it
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Worker threads (0 = rayon default)
    #[arg(long, default_value_t = 0)]
    threads: usize,

    /// Output root for data_N*/ and logs_N*/
    #[arg(long, default_value = ".")]
    out: PathBuf,
}

impl Cli {
    fn targets(&self) -> Vec<f64> {
        match self.h0_count {
            0 => Vec::new(),
            1 => vec![self.h0_min],
            k => (0..k)
                .map(|i| self.h0_min + (self.h0_max - self.h0_min) * i as f64 / (k - 1) as f64)
                .collect(),
        }
    }

    fn params(&self, h0: f64, seed: u64) -> RunParameters {
        let coupling = match self.range {
            Some(range) => CouplingSpec::Structured { j0: self.j0, range },
            None => CouplingSpec::Disordered { j0: self.j0, sigma: self.sigma },
        };
        RunParameters {
            n: self.n,
            h0,
            coupling,
            chi: self.chi,
            dh: self.dh,
            seed,
            t_min: self.t_min,
            t_max: self.t_max,
            nt: self.nt,
            log_every: self.log_every,
            ..RunParameters::default()
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    if cli.threads > 0 {
        rayon::ThreadPoolBuilder::new().num_threads(cli.threads).build_global()?;
    }

    let targets = cli.targets();
    info!(n = cli.n, runs = targets.len(), "sweep started");

    let bar = ProgressBar::new(targets.len() as u64);
    bar.set_style(ProgressStyle::with_template(
        " {bar:40.cyan/blue} {pos}/{len} [{elapsed_precise}]",
    )?);

    let failures: Mutex<Vec<(f64, String)>> = Mutex::new(Vec::new());
    let finished: Mutex<Vec<(f64, RunOutcome)>> = Mutex::new(Vec::new());

    targets.par_iter().enumerate().for_each(|(idx, &h0)| {
        let params = cli.params(h0, derive_seed(cli.seed, idx));
        let mut meta = BTreeMap::new();
        meta.insert("master_seed".to_string(), json!(cli.seed));
        meta.insert("run_index".to_string(), json!(idx));

        match run_single(&params, &cli.out, meta) {
            Ok(outcome) => {
                if let Ok(mut done) = finished.lock() {
                    done.push((h0, outcome));
                }
            }
            Err(e) => {
                error!(h0, error = %e, "run failed");
                if let Ok(mut failed) = failures.lock() {
                    failed.push((h0, e.to_string()));
                }
            }
        }
        bar.inc(1);
    });
    bar.finish();

    let mut done = finished.into_inner().map_err(|e| e.to_string())?;
    done.sort_by(|a, b| a.0.total_cmp(&b.0));
    for (h0, outcome) in &done {
        println!(
            "h0 = {h0:.4}  samples = {:>6}  cost = {:.2e}  converged = {}  -> {}",
            outcome.samples,
            outcome.heuristic_cost,
            outcome.heuristic_converged,
            outcome.snapshot_path.display()
        );
    }

    let failed = failures.into_inner().map_err(|e| e.to_string())?;
    if !failed.is_empty() {
        return Err(format!("{} of {} runs failed", failed.len(), targets.len()).into());
    }
    Ok(())
}
