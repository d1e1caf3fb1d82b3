// integrator.rs - Adaptive Dormand–Prince 5(4) integration of the ECPN equation of motion
//
//   d psi_k / dt = -i ( -(J psi)_k + chi |psi_k|^2 psi_k )
//
// Total power and energy are conserved by the exact flow; both serve as
// accuracy checks on the stepper.

use crate::coupling::CouplingMatrix;
use crate::error::{EcpnError, Result};
use num_complex::Complex64;
use tracing::debug;

/// Right-hand side of the equation of motion.
#[derive(Debug, Clone, Copy)]
pub struct EquationOfMotion<'a> {
    pub j: &'a CouplingMatrix,
    pub chi: f64,
}

impl<'a> EquationOfMotion<'a> {
    pub fn new(j: &'a CouplingMatrix, chi: f64) -> Self {
        Self { j, chi }
    }

    /// `out = d psi / dt` at `psi`.
    pub fn rhs(&self, psi: &[Complex64], out: &mut [Complex64]) {
        self.j.apply(psi, out);
        let minus_i = Complex64::new(0.0, -1.0);
        for (o, &p) in out.iter_mut().zip(psi) {
            *o = minus_i * (-*o + p * (self.chi * p.norm_sqr()));
        }
    }

    /// Allocating variant of [`rhs`](Self::rhs).
    pub fn rate_of_change(&self, psi: &[Complex64]) -> Vec<Complex64> {
        let mut out = vec![Complex64::new(0.0, 0.0); psi.len()];
        self.rhs(psi, &mut out);
        out
    }
}

/// Receives the state at every output time.
pub trait Observe {
    fn observe(&mut self, step: usize, t: f64, psi: &[Complex64]) -> Result<()>;
}

impl<F> Observe for F
where
    F: FnMut(usize, f64, &[Complex64]) -> Result<()>,
{
    fn observe(&mut self, step: usize, t: f64, psi: &[Complex64]) -> Result<()> {
        self(step, t, psi)
    }
}

/// `nt` evenly spaced output times on `[t_min, t_max]`, endpoints included.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeGrid {
    pub t_min: f64,
    pub t_max: f64,
    pub nt: usize,
}

impl TimeGrid {
    pub fn new(t_min: f64, t_max: f64, nt: usize) -> Result<Self> {
        if !t_min.is_finite() || !t_max.is_finite() || t_max <= t_min {
            return Err(EcpnError::invalid("t_max", format!("need finite t_min < t_max, got [{t_min}, {t_max}]")));
        }
        if nt < 2 {
            return Err(EcpnError::invalid("nt", format!("need at least two output times, got {nt}")));
        }
        Ok(Self { t_min, t_max, nt })
    }

    pub fn dt(&self) -> f64 {
        (self.t_max - self.t_min) / (self.nt - 1) as f64
    }

    /// Output time with index `i` (`0` is `t_min`).
    pub fn time(&self, i: usize) -> f64 {
        if i + 1 == self.nt {
            self.t_max
        } else {
            self.t_min + i as f64 * self.dt()
        }
    }
}

/// Step-size control settings.
#[derive(Debug, Clone, Copy)]
pub struct SolverConfig {
    pub rtol: f64,
    pub atol: f64,
    /// Failure threshold on steps spent between two output times.
    pub max_steps_per_output: usize,
    pub safety: f64,
    pub min_factor: f64,
    pub max_factor: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            rtol: 1e-10,
            atol: 1e-12,
            max_steps_per_output: 100_000,
            safety: 0.9,
            min_factor: 0.2,
            max_factor: 10.0,
        }
    }
}

// Dormand–Prince 5(4) tableau. The flow is autonomous, so the nodes c_i
// never enter the stages.
const A21: f64 = 1.0 / 5.0;
const A31: f64 = 3.0 / 40.0;
const A32: f64 = 9.0 / 40.0;
const A41: f64 = 44.0 / 45.0;
const A42: f64 = -56.0 / 15.0;
const A43: f64 = 32.0 / 9.0;
const A51: f64 = 19372.0 / 6561.0;
const A52: f64 = -25360.0 / 2187.0;
const A53: f64 = 64448.0 / 6561.0;
const A54: f64 = -212.0 / 729.0;
const A61: f64 = 9017.0 / 3168.0;
const A62: f64 = -355.0 / 33.0;
const A63: f64 = 46732.0 / 5247.0;
const A64: f64 = 49.0 / 176.0;
const A65: f64 = -5103.0 / 18656.0;
const A71: f64 = 35.0 / 384.0;
const A73: f64 = 500.0 / 1113.0;
const A74: f64 = 125.0 / 192.0;
const A75: f64 = -2187.0 / 6784.0;
const A76: f64 = 11.0 / 84.0;

// 5th minus embedded 4th order weights.
const E1: f64 = 71.0 / 57600.0;
const E3: f64 = -71.0 / 16695.0;
const E4: f64 = 71.0 / 1920.0;
const E5: f64 = -17253.0 / 339200.0;
const E6: f64 = 22.0 / 525.0;
const E7: f64 = -1.0 / 40.0;

/// Explicit adaptive stepper with first-same-as-last stage reuse.
pub struct Dopri5<'a> {
    eom: EquationOfMotion<'a>,
    cfg: SolverConfig,
    k: [Vec<Complex64>; 7],
    stage: Vec<Complex64>,
    y_new: Vec<Complex64>,
    accepted: usize,
    rejected: usize,
}

impl<'a> Dopri5<'a> {
    pub fn new(eom: EquationOfMotion<'a>, cfg: SolverConfig) -> Self {
        let n = eom.j.n();
        let zeros = || vec![Complex64::new(0.0, 0.0); n];
        Self {
            eom,
            cfg,
            k: std::array::from_fn(|_| zeros()),
            stage: zeros(),
            y_new: zeros(),
            accepted: 0,
            rejected: 0,
        }
    }

    pub fn accepted_steps(&self) -> usize {
        self.accepted
    }

    pub fn rejected_steps(&self) -> usize {
        self.rejected
    }

    /// Weighted RMS norm over real and imaginary parts.
    fn error_norm(&self, y: &[Complex64], y_new: &[Complex64], err: &[Complex64]) -> f64 {
        let mut acc = 0.0;
        for ((a, b), e) in y.iter().zip(y_new).zip(err) {
            let sc_re = self.cfg.atol + self.cfg.rtol * a.re.abs().max(b.re.abs());
            let sc_im = self.cfg.atol + self.cfg.rtol * a.im.abs().max(b.im.abs());
            acc += (e.re / sc_re).powi(2) + (e.im / sc_im).powi(2);
        }
        (acc / (2 * y.len()) as f64).sqrt()
    }

    /// Starting step from the scale of `y` and `f(y)`.
    fn initial_step(&self, y: &[Complex64], f: &[Complex64], span: f64) -> f64 {
        let mut d0 = 0.0;
        let mut d1 = 0.0;
        for (a, b) in y.iter().zip(f) {
            let sc_re = self.cfg.atol + self.cfg.rtol * a.re.abs();
            let sc_im = self.cfg.atol + self.cfg.rtol * a.im.abs();
            d0 += (a.re / sc_re).powi(2) + (a.im / sc_im).powi(2);
            d1 += (b.re / sc_re).powi(2) + (b.im / sc_im).powi(2);
        }
        let h = if d0 < 1e-10 || d1 < 1e-10 { 1e-6 } else { 0.01 * (d0 / d1).sqrt() };
        h.min(span)
    }

    fn stage_input(&mut self, y: &[Complex64], h: f64, coeffs: &[(usize, f64)]) {
        for (i, s) in self.stage.iter_mut().enumerate() {
            let mut acc = Complex64::new(0.0, 0.0);
            for &(idx, a) in coeffs {
                acc += self.k[idx][i] * a;
            }
            *s = y[i] + acc * h;
        }
    }

    fn eval_stage(&mut self, out: usize) {
        let Self { eom, k, stage, .. } = self;
        eom.rhs(stage, &mut k[out]);
    }

    /// One trial step of size `h` from `y`, whose derivative sits in `k[0]`.
    /// Returns the error norm; the candidate is left in `y_new` and its
    /// derivative in `k[6]`.
    fn attempt(&mut self, y: &[Complex64], h: f64) -> f64 {
        self.stage_input(y, h, &[(0, A21)]);
        self.eval_stage(1);
        self.stage_input(y, h, &[(0, A31), (1, A32)]);
        self.eval_stage(2);
        self.stage_input(y, h, &[(0, A41), (1, A42), (2, A43)]);
        self.eval_stage(3);
        self.stage_input(y, h, &[(0, A51), (1, A52), (2, A53), (3, A54)]);
        self.eval_stage(4);
        self.stage_input(y, h, &[(0, A61), (1, A62), (2, A63), (3, A64), (4, A65)]);
        self.eval_stage(5);
        self.stage_input(y, h, &[(0, A71), (2, A73), (3, A74), (4, A75), (5, A76)]);
        self.y_new.copy_from_slice(&self.stage);
        self.eval_stage(6);

        let err: Vec<Complex64> = (0..y.len())
            .map(|i| {
                let k = &self.k;
                (k[0][i] * E1 + k[2][i] * E3 + k[3][i] * E4 + k[4][i] * E5 + k[5][i] * E6 + k[6][i] * E7) * h
            })
            .collect();
        self.error_norm(y, &self.y_new, &err)
    }

    /// Advance `y` from `t` to exactly `t_end`, adapting the step size `h`.
    fn advance_to(&mut self, t: &mut f64, y: &mut [Complex64], h: &mut f64, t_end: f64) -> Result<()> {
        let mut steps = 0;
        while *t < t_end {
            if steps >= self.cfg.max_steps_per_output {
                return Err(EcpnError::NumericalFailure(format!(
                    "more than {} steps needed to reach t = {t_end} from t = {}",
                    self.cfg.max_steps_per_output, *t
                )));
            }
            let remaining = t_end - *t;
            let last = *h >= remaining;
            let h_try = if last { remaining } else { *h };
            if h_try <= f64::EPSILON * t.abs().max(1.0) * 4.0 && !last {
                return Err(EcpnError::NumericalFailure(format!("step size underflow (h = {h_try:e}) at t = {}", *t)));
            }

            let err = self.attempt(y, h_try);
            steps += 1;
            if !err.is_finite() {
                self.rejected += 1;
                *h = h_try * self.cfg.min_factor;
                continue;
            }

            let factor = if err == 0.0 {
                self.cfg.max_factor
            } else {
                (self.cfg.safety * err.powf(-0.2)).clamp(self.cfg.min_factor, self.cfg.max_factor)
            };

            if err <= 1.0 {
                self.accepted += 1;
                *t = if last { t_end } else { *t + h_try };
                y.copy_from_slice(&self.y_new);
                let (first, rest) = self.k.split_at_mut(1);
                first[0].copy_from_slice(&rest[5]);
                // Keep the unclamped step for the next interval.
                if !last || factor < 1.0 {
                    *h = h_try * factor;
                }
            } else {
                self.rejected += 1;
                *h = h_try * factor.min(1.0);
            }
        }
        Ok(())
    }

    /// Integrate `psi` across `grid`, calling `observer` after each output
    /// time `grid.time(step + 1)` with `step = 0..nt-1`.
    ///
    /// Returns the final time and configuration.
    pub fn evolve(
        &mut self,
        mut psi: Vec<Complex64>,
        grid: &TimeGrid,
        observer: &mut impl Observe,
    ) -> Result<(f64, Vec<Complex64>)> {
        let n = self.eom.j.n();
        if psi.len() != n {
            return Err(EcpnError::invalid("psi", format!("length {} does not match coupling size {n}", psi.len())));
        }

        let mut t = grid.t_min;
        self.eom.rhs(&psi, &mut self.k[0]);
        let mut h = self.initial_step(&psi, &self.k[0], grid.dt());

        for step in 0..grid.nt - 1 {
            let t_out = grid.time(step + 1);
            self.advance_to(&mut t, &mut psi, &mut h, t_out)?;
            observer.observe(step, t, &psi)?;
        }

        debug!(
            accepted = self.accepted,
            rejected = self.rejected,
            t_final = t,
            "integration finished"
        );
        Ok((t, psi))
    }
}

/// Integrate with default solver settings (rtol 1e-10).
pub fn evolve(
    j: &CouplingMatrix,
    chi: f64,
    psi: Vec<Complex64>,
    grid: &TimeGrid,
    observer: &mut impl Observe,
) -> Result<(f64, Vec<Complex64>)> {
    Dopri5::new(EquationOfMotion::new(j, chi), SolverConfig::default()).evolve(psi, grid, observer)
}
