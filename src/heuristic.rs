// heuristic.rs - Greedy local search for initial mode configurations
//
// Prepares a configuration with fixed total power whose energy density is
// within `tolerance` of a target. The objective is injected as a closure so
// the search works for any configuration -> scalar map.

use crate::error::{EcpnError, Result};
use crate::thermo::power;
use num_complex::Complex64;
use rand::Rng;
use rand_distr::StandardNormal;
use tracing::{debug, warn};

/// Search parameters.
#[derive(Debug, Clone, Copy)]
pub struct HeuristicConfig {
    /// Target value `h0` of the objective.
    pub target: f64,
    /// Stop once `|h(psi) - h0| <= tolerance`.
    pub tolerance: f64,
    /// Iteration cap.
    pub max_iterations: usize,
    /// Optical power per mode of the seed configuration.
    pub power_per_mode: f64,
}

impl Default for HeuristicConfig {
    fn default() -> Self {
        Self {
            target: 0.0,
            tolerance: 1e-4,
            max_iterations: 1_000_000,
            power_per_mode: 1.0,
        }
    }
}

/// Result of a search. Not converging within the cap is not an error.
#[derive(Debug, Clone)]
pub struct HeuristicOutcome {
    pub configuration: Vec<Complex64>,
    /// Cost of the seed configuration.
    pub initial_cost: f64,
    /// Cost of `configuration`.
    pub cost: f64,
    /// Cost after every iteration.
    pub cost_trace: Vec<f64>,
    pub iterations: usize,
    pub converged: bool,
}

/// Proposal of the local move; only the two touched modes are stored.
#[derive(Debug, Clone, Copy)]
pub struct PairMove {
    pub j: usize,
    pub k: usize,
    pub new_j: Complex64,
    pub new_k: Complex64,
}

impl PairMove {
    fn apply(&self, psi: &mut [Complex64]) {
        psi[self.j] = self.new_j;
        psi[self.k] = self.new_k;
    }
}

/// Complex normal variate with unit mean power.
fn complex_normal(rng: &mut impl Rng) -> Complex64 {
    let re: f64 = rng.sample(StandardNormal);
    let im: f64 = rng.sample(StandardNormal);
    Complex64::new(re, im) / std::f64::consts::SQRT_2
}

/// Random configuration with total power `power_per_mode * n`.
pub fn sample_random_state(rng: &mut impl Rng, n: usize, power_per_mode: f64) -> Result<Vec<Complex64>> {
    if n == 0 {
        return Err(EcpnError::invalid("n", "configuration needs at least one mode"));
    }
    if !power_per_mode.is_finite() || power_per_mode <= 0.0 {
        return Err(EcpnError::invalid("power_per_mode", format!("must be positive, got {power_per_mode}")));
    }

    let mut psi: Vec<Complex64> = (0..n)
        .map(|_| {
            let re: f64 = rng.sample(StandardNormal);
            let im: f64 = rng.sample(StandardNormal);
            Complex64::new(re, im)
        })
        .collect();

    let scale = (power_per_mode * n as f64 / power(&psi)).sqrt();
    for p in &mut psi {
        *p *= scale;
    }
    Ok(psi)
}

/// Draw a power-conserving redistribution between two distinct modes.
///
/// `|new_j|^2 + |new_k|^2 == |psi_j|^2 + |psi_k|^2`.
pub fn propose_pair_move(rng: &mut impl Rng, psi: &[Complex64]) -> PairMove {
    let n = psi.len();
    debug_assert!(n >= 2);
    let j = rng.gen_range(0..n);
    let mut k = j;
    while k == j {
        k = rng.gen_range(0..n);
    }

    let chi_1 = complex_normal(rng);
    let chi_2 = complex_normal(rng);
    let xi = (psi[j].norm_sqr() + psi[k].norm_sqr()) / (chi_1.norm_sqr() + chi_2.norm_sqr());
    let s = xi.sqrt();
    PairMove { j, k, new_j: chi_1 * s, new_k: chi_2 * s }
}

/// First-improvement hill climbing on `|h(psi) - h0|`.
///
/// A proposal replaces the current configuration only if it strictly lowers
/// the cost, so the returned cost never exceeds the seed's.
pub fn prepare_initial_state<R, F>(
    rng: &mut R,
    n: usize,
    h_fun: F,
    cfg: &HeuristicConfig,
) -> Result<HeuristicOutcome>
where
    R: Rng,
    F: Fn(&[Complex64]) -> f64,
{
    if n < 2 {
        return Err(EcpnError::invalid("n", format!("local moves need at least two modes, got {n}")));
    }
    if !cfg.tolerance.is_finite() || cfg.tolerance < 0.0 {
        return Err(EcpnError::invalid("tolerance", format!("must be >= 0, got {}", cfg.tolerance)));
    }
    if !cfg.target.is_finite() {
        return Err(EcpnError::invalid("target", format!("must be finite, got {}", cfg.target)));
    }

    let cost_fun = |x: &[Complex64]| (h_fun(x) - cfg.target).abs();

    let mut psi = sample_random_state(rng, n, cfg.power_per_mode)?;
    let initial_cost = cost_fun(psi.as_slice());
    let mut cost = initial_cost;
    let mut cost_trace = Vec::new();
    let mut trial = psi.clone();

    let mut m = 0;
    while m < cfg.max_iterations && cost > cfg.tolerance {
        trial.copy_from_slice(&psi);
        propose_pair_move(rng, &psi).apply(&mut trial);

        let trial_cost = cost_fun(trial.as_slice());
        if trial_cost < cost {
            std::mem::swap(&mut psi, &mut trial);
            cost = trial_cost;
        }
        cost_trace.push(cost);
        m += 1;
    }

    let converged = cost <= cfg.tolerance;
    if converged {
        debug!(iterations = m, cost, "initial state converged");
    } else {
        warn!(iterations = m, cost, tolerance = cfg.tolerance, "initial state search hit iteration cap");
    }

    Ok(HeuristicOutcome {
        configuration: psi,
        initial_cost,
        cost,
        cost_trace,
        iterations: m,
        converged,
    })
}
