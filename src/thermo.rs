// thermo.rs - Energy, power and magnetization of a mode configuration

use crate::coupling::CouplingMatrix;
use num_complex::Complex64;

/// Extensive energy `E = -sum_i psi_i (J psi*)_i + chi/2 sum_i |psi_i|^4`.
pub fn energy(j: &CouplingMatrix, chi: f64, psi: &[Complex64]) -> f64 {
    let n = j.n();
    let mut linear = Complex64::new(0.0, 0.0);
    for i in 0..n {
        let mut h = Complex64::new(0.0, 0.0);
        for k in 0..n {
            let w = j.get(i, k);
            if w != 0.0 {
                h += psi[k].conj() * w;
            }
        }
        linear += h * psi[i];
    }
    let nonlinear: f64 = psi.iter().map(|p| p.norm_sqr() * p.norm_sqr()).sum();
    -linear.re + 0.5 * chi * nonlinear
}

/// Energy density `E / N`.
pub fn energy_density(j: &CouplingMatrix, chi: f64, psi: &[Complex64]) -> f64 {
    energy(j, chi, psi) / psi.len() as f64
}

/// Total optical power `A = sum_i |psi_i|^2`.
pub fn power(psi: &[Complex64]) -> f64 {
    psi.iter().map(|p| p.norm_sqr()).sum()
}

/// Complex reduced magnetization, the mean mode amplitude.
pub fn magnetization_cplx(psi: &[Complex64]) -> Complex64 {
    psi.iter().sum::<Complex64>() / psi.len() as f64
}

/// Real order parameter `|m|`.
///
/// Overestimates the order in the disordered phase; susceptibilities built
/// from it do not suffer from this.
pub fn magnetization(psi: &[Complex64]) -> f64 {
    magnetization_cplx(psi).norm()
}
