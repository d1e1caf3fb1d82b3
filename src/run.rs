// run.rs - Run parameters and the single-run pipeline
//
// coupling -> initial state -> integration with observation -> snapshot

use crate::coupling::CouplingSpec;
use crate::error::{EcpnError, Result};
use crate::heuristic::{prepare_initial_state, HeuristicConfig};
use crate::integrator::{Dopri5, EquationOfMotion, SolverConfig, TimeGrid};
use crate::observer::Observer;
use crate::snapshot::Snapshot;
use crate::thermo::energy_density;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

/// Immutable description of one run (single source of truth).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunParameters {
    pub n: usize,
    /// Target energy density.
    pub h0: f64,
    pub coupling: CouplingSpec,
    pub chi: f64,
    /// Heuristic tolerance on `|h - h0|`.
    pub dh: f64,
    pub seed: u64,
    pub t_min: f64,
    pub t_max: f64,
    /// Number of output times, endpoints included.
    pub nt: usize,
    /// Record every `log_every`-th output step.
    pub log_every: usize,
    pub power_per_mode: f64,
    pub max_iterations: usize,
}

impl Default for RunParameters {
    fn default() -> Self {
        Self {
            n:              12,
            h0:             0.5,
            coupling:       CouplingSpec::Disordered { j0: 1.2, sigma: 0.0 },
            chi:            1.0,
            dh:             1e-3,
            seed:           0,
            t_min:          0.0,
            t_max:          1e6,
            nt:             100_001,
            log_every:      100,
            power_per_mode: 1.0,
            max_iterations: 1_000_000,
        }
    }
}

impl RunParameters {
    pub fn validate(&self) -> Result<()> {
        if self.n < 2 {
            return Err(EcpnError::invalid("n", format!("need at least two modes, got {}", self.n)));
        }
        if !self.h0.is_finite() {
            return Err(EcpnError::invalid("h0", format!("must be finite, got {}", self.h0)));
        }
        if !self.chi.is_finite() {
            return Err(EcpnError::invalid("chi", format!("must be finite, got {}", self.chi)));
        }
        if !self.dh.is_finite() || self.dh <= 0.0 {
            return Err(EcpnError::invalid("dh", format!("must be positive, got {}", self.dh)));
        }
        if self.log_every == 0 {
            return Err(EcpnError::invalid("log_every", "log stride must be positive"));
        }
        if !self.power_per_mode.is_finite() || self.power_per_mode <= 0.0 {
            return Err(EcpnError::invalid("power_per_mode", format!("must be positive, got {}", self.power_per_mode)));
        }
        TimeGrid::new(self.t_min, self.t_max, self.nt)?;
        Ok(())
    }

    pub fn time_grid(&self) -> Result<TimeGrid> {
        TimeGrid::new(self.t_min, self.t_max, self.nt)
    }

    pub fn heuristic_config(&self) -> HeuristicConfig {
        HeuristicConfig {
            target: self.h0,
            tolerance: self.dh,
            max_iterations: self.max_iterations,
            power_per_mode: self.power_per_mode,
        }
    }

    /// `<root>/data_N{n}/<snapshot file>`.
    pub fn snapshot_path(&self, root: &Path) -> PathBuf {
        root.join(format!("data_N{}", self.n)).join(Snapshot::file_name(self))
    }

    /// `<root>/logs_N{n}/N{n}_h0{h0}.log`.
    pub fn log_path(&self, root: &Path) -> PathBuf {
        root.join(format!("logs_N{}", self.n))
            .join(format!("N{}_h0{:.6}.log", self.n, self.h0))
    }
}

/// What a finished run reports back besides its snapshot file.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub snapshot_path: PathBuf,
    pub t_final: f64,
    pub samples: usize,
    pub heuristic_cost: f64,
    pub heuristic_converged: bool,
}

/// Execute one run end to end and persist its snapshot under `root`.
///
/// All randomness comes from a single RNG seeded with `params.seed`.
pub fn run_single(
    params: &RunParameters,
    root: &Path,
    mut metadata: BTreeMap<String, Value>,
) -> Result<RunOutcome> {
    params.validate()?;
    let grid = params.time_grid()?;
    info!(n = params.n, h0 = params.h0, seed = params.seed, "run started");

    let mut rng = ChaCha20Rng::seed_from_u64(params.seed);
    let j = params.coupling.build(params.n, &mut rng)?;

    let chi = params.chi;
    let h_fun = |x: &[num_complex::Complex64]| energy_density(&j, chi, x);
    let initial = prepare_initial_state(&mut rng, params.n, h_fun, &params.heuristic_config())?;

    let mut observer = Observer::new(j.clone(), chi, params.nt, params.log_every)?
        .with_log(&params.log_path(root))?;
    let mut solver = Dopri5::new(EquationOfMotion::new(&j, chi), SolverConfig::default());
    let (t_final, cfg_fin) = solver.evolve(initial.configuration.clone(), &grid, &mut observer)?;

    metadata.insert("heuristic_cost".into(), json!(initial.cost));
    metadata.insert("heuristic_iterations".into(), json!(initial.iterations));
    metadata.insert("heuristic_converged".into(), json!(initial.converged));
    metadata.insert("solver_accepted_steps".into(), json!(solver.accepted_steps()));
    metadata.insert("solver_rejected_steps".into(), json!(solver.rejected_steps()));

    let snapshot_path = params.snapshot_path(root);
    let snapshot = observer.finalize(params, initial.configuration, cfg_fin, metadata, &snapshot_path)?;
    info!(n = params.n, h0 = params.h0, t_final, "run finished");

    Ok(RunOutcome {
        snapshot_path,
        t_final,
        samples: snapshot.len(),
        heuristic_cost: initial.cost,
        heuristic_converged: initial.converged,
    })
}
