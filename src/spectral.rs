// spectral.rs - Supermodes and linear eigenfrequencies of the coupling operator

use crate::coupling::CouplingMatrix;
use crate::error::{EcpnError, Result};
use nalgebra::{DMatrix, DVector, SymmetricEigen};
use num_complex::Complex64;

/// Eigen-decomposition of `J`, sorted by ascending eigenfrequency.
///
/// Column `k` of `supermodes` belongs to `eigenfrequencies[k]`.
#[derive(Debug, Clone)]
pub struct SpectralBasis {
    pub eigenfrequencies: DVector<f64>,
    pub supermodes: DMatrix<f64>,
}

impl SpectralBasis {
    /// Decompose `J`. Pure; recompute whenever a basis is needed.
    pub fn decompose(j: &CouplingMatrix) -> Self {
        let eigen = SymmetricEigen::new(j.matrix().clone());
        let n = eigen.eigenvalues.len();

        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| eigen.eigenvalues[a].total_cmp(&eigen.eigenvalues[b]));

        let eigenfrequencies = DVector::from_iterator(n, order.iter().map(|&k| eigen.eigenvalues[k]));
        let mut supermodes = DMatrix::zeros(n, n);
        for (dst, &src) in order.iter().enumerate() {
            supermodes.set_column(dst, &eigen.eigenvectors.column(src));
        }

        Self { eigenfrequencies, supermodes }
    }

    pub fn n(&self) -> usize {
        self.eigenfrequencies.len()
    }

    /// Supermode amplitudes `C_k = sum_i psi_i V_ik`.
    pub fn amplitudes_from_field(&self, psi: &[Complex64]) -> Result<Vec<Complex64>> {
        self.check_len(psi.len())?;
        let n = self.n();
        Ok((0..n)
            .map(|k| (0..n).map(|i| psi[i] * self.supermodes[(i, k)]).sum())
            .collect())
    }

    /// Mode field `psi_i = sum_k V_ik C_k`.
    pub fn field_from_amplitudes(&self, amplitudes: &[Complex64]) -> Result<Vec<Complex64>> {
        self.check_len(amplitudes.len())?;
        let n = self.n();
        Ok((0..n)
            .map(|i| (0..n).map(|k| amplitudes[k] * self.supermodes[(i, k)]).sum())
            .collect())
    }

    fn check_len(&self, len: usize) -> Result<()> {
        if len != self.n() {
            return Err(EcpnError::invalid(
                "configuration",
                format!("length {len} does not match basis size {}", self.n()),
            ));
        }
        Ok(())
    }
}
