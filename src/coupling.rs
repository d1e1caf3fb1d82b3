// coupling.rs - Mode-mode coupling operator J for equal-coupling photonic networks

use crate::error::{EcpnError, Result};
use nalgebra::DMatrix;
use num_complex::Complex64;
use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

/// Real, symmetric, zero-diagonal coupling matrix.
///
/// Built once per run and only read afterwards, so the inner matrix is not
/// exposed mutably.
#[derive(Debug, Clone, PartialEq)]
pub struct CouplingMatrix {
    j: DMatrix<f64>,
}

/// Topology used to build `J`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CouplingSpec {
    /// Ring with finite interaction range `L = floor(range * N)`.
    Structured { j0: f64, range: f64 },
    /// All-to-all with normal entries of mean `j0/N` and spread `sigma/sqrt(N)`.
    Disordered { j0: f64, sigma: f64 },
}

impl CouplingSpec {
    /// Build the matrix for `n` modes. Only the disordered topology draws
    /// from `rng`.
    pub fn build(&self, n: usize, rng: &mut impl Rng) -> Result<CouplingMatrix> {
        match *self {
            CouplingSpec::Structured { j0, range } => CouplingMatrix::structured(j0, n, range),
            CouplingSpec::Disordered { j0, sigma } => CouplingMatrix::disordered_with(rng, j0, sigma, n),
        }
    }
}

impl CouplingMatrix {
    /// Ring topology: node `i` couples to every node within circular distance
    /// `L = floor(range * n)`, weight `j0 / (2L)`.
    ///
    /// `L = 0` is a valid degenerate network without edges and yields the
    /// all-zero matrix.
    pub fn structured(j0: f64, n: usize, range: f64) -> Result<Self> {
        if n == 0 {
            return Err(EcpnError::invalid("n", "network needs at least one mode"));
        }
        if !j0.is_finite() {
            return Err(EcpnError::invalid("j0", format!("must be finite, got {j0}")));
        }
        if !range.is_finite() || range < 0.0 {
            return Err(EcpnError::invalid("range", format!("must be finite and >= 0, got {range}")));
        }

        let l = (range * n as f64).floor() as usize;
        let mut j = DMatrix::zeros(n, n);
        if l == 0 {
            return Ok(Self { j });
        }

        let weight = j0 / (2 * l) as f64;
        for i in 0..n {
            for k in 0..n {
                if k != i && ring_distance(i, k, n) <= l {
                    j[(i, k)] = weight;
                }
            }
        }
        Ok(Self { j })
    }

    /// Disordered all-to-all coupling drawn from a caller-supplied RNG.
    ///
    /// `sigma = 0` gives uniform coupling `j0/N`, `j0 = 0` a zero-mean
    /// frustrated network.
    pub fn disordered_with(rng: &mut impl Rng, j0: f64, sigma: f64, n: usize) -> Result<Self> {
        if n == 0 {
            return Err(EcpnError::invalid("n", "network needs at least one mode"));
        }
        if !j0.is_finite() {
            return Err(EcpnError::invalid("j0", format!("must be finite, got {j0}")));
        }
        if !sigma.is_finite() || sigma < 0.0 {
            return Err(EcpnError::invalid("sigma", format!("must be finite and >= 0, got {sigma}")));
        }

        let nf = n as f64;
        let mean = j0 / nf;
        let spread = sigma / nf.sqrt();
        let mut j = DMatrix::zeros(n, n);
        for i in 0..n {
            for k in (i + 1)..n {
                let z: f64 = rng.sample(StandardNormal);
                let w = mean + spread * z;
                j[(i, k)] = w;
                j[(k, i)] = w;
            }
        }
        Ok(Self { j })
    }

    /// Rebuild from a row-major nested vector, e.g. one read from a snapshot.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let n = rows.len();
        if n == 0 {
            return Err(EcpnError::invalid("rows", "empty coupling matrix"));
        }
        if let Some(bad) = rows.iter().position(|r| r.len() != n) {
            return Err(EcpnError::invalid("rows", format!("row {bad} has length {}, expected {n}", rows[bad].len())));
        }
        let j = DMatrix::from_fn(n, n, |i, k| rows[i][k]);
        let out = Self { j };
        if !out.is_symmetric(0.0) || !out.has_zero_diagonal() {
            return Err(EcpnError::invalid("rows", "matrix must be symmetric with zero diagonal"));
        }
        Ok(out)
    }

    /// Row-major copy for persistence.
    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        (0..self.n()).map(|i| self.j.row(i).iter().copied().collect()).collect()
    }

    /// Number of modes.
    #[inline(always)]
    pub fn n(&self) -> usize {
        self.j.nrows()
    }

    #[inline(always)]
    pub fn get(&self, i: usize, k: usize) -> f64 {
        self.j[(i, k)]
    }

    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.j
    }

    /// `out = J · psi` for a complex configuration.
    pub fn apply(&self, psi: &[Complex64], out: &mut [Complex64]) {
        let n = self.n();
        debug_assert_eq!(psi.len(), n);
        debug_assert_eq!(out.len(), n);
        for (i, o) in out.iter_mut().enumerate() {
            let mut acc = Complex64::new(0.0, 0.0);
            for k in 0..n {
                let w = self.j[(i, k)];
                if w != 0.0 {
                    acc += psi[k] * w;
                }
            }
            *o = acc;
        }
    }

    pub fn is_symmetric(&self, tol: f64) -> bool {
        let n = self.n();
        (0..n).all(|i| (0..i).all(|k| (self.j[(i, k)] - self.j[(k, i)]).abs() <= tol))
    }

    pub fn has_zero_diagonal(&self) -> bool {
        (0..self.n()).all(|i| self.j[(i, i)] == 0.0)
    }

    /// Count of nonzero entries in row `i`.
    pub fn row_degree(&self, i: usize) -> usize {
        self.j.row(i).iter().filter(|&&w| w != 0.0).count()
    }
}

/// Shortest distance between two nodes on a ring of `n` nodes.
#[inline(always)]
fn ring_distance(i: usize, k: usize, n: usize) -> usize {
    let d = i.abs_diff(k);
    d.min(n - d)
}
