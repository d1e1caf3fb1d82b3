// equilibrium.rs - Rayleigh–Jeans thermal equilibrium for weak nonlinearity
//
// Optical temperature T and chemical potential mu follow from the linear
// eigenfrequencies e_k, the total power A and the energy E. Used to cross-check
// simulated supermode occupancies.

use crate::error::{EcpnError, Result};

/// Bisection tolerance on the temperature.
const XTOL: f64 = 2e-12;
const MAX_BISECTIONS: usize = 200;

/// Upper end of the temperature bracket.
const T_UPPER: f64 = 100.0;

/// Optical temperature, positive-temperature branch.
///
/// Solves `sum_k T / (N T - rho_k) = 1` with `rho_k = E - A e_k` by bisection
/// on `[rho_0/N + 0.1, 100]`, `e` sorted ascending. Requires `A > 0` and `E <= 0`.
pub fn optical_temperature(n: usize, a: f64, e_total: f64, eigenfrequencies: &[f64]) -> Result<f64> {
    if !a.is_finite() || a <= 0.0 {
        return Err(EcpnError::invalid("power", format!("total power must be positive, got {a}")));
    }
    if e_total > 0.0 {
        return Err(EcpnError::invalid("energy", format!("optical temperature needs E <= 0, got {e_total}")));
    }
    if n == 0 || eigenfrequencies.len() != n {
        return Err(EcpnError::invalid(
            "eigenfrequencies",
            format!("expected {n} eigenfrequencies, got {}", eigenfrequencies.len()),
        ));
    }

    let nf = n as f64;
    let rho: Vec<f64> = eigenfrequencies.iter().map(|&e| e_total - a * e).collect();
    let rho_max = rho.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let fun = |t: f64| rho.iter().map(|&r| t / (nf * t - r)).sum::<f64>() - 1.0;

    bisect(fun, rho_max / nf + 1e-1, T_UPPER)
}

/// `mu = (E - N T) / A`.
pub fn chemical_potential(n: usize, a: f64, e_total: f64, temperature: f64) -> f64 {
    (e_total - n as f64 * temperature) / a
}

/// Rayleigh–Jeans occupancies `T / (e_k - mu)`.
pub fn average_optical_powers(eigenfrequencies: &[f64], temperature: f64, mu: f64) -> Vec<f64> {
    eigenfrequencies.iter().map(|&e| temperature / (e - mu)).collect()
}

/// Temperature, chemical potential and occupancies in one go.
#[derive(Debug, Clone)]
pub struct ThermalEquilibrium {
    pub temperature: f64,
    pub mu: f64,
    pub occupancies: Vec<f64>,
}

pub fn thermal_equilibrium(n: usize, a: f64, e_total: f64, eigenfrequencies: &[f64]) -> Result<ThermalEquilibrium> {
    let temperature = optical_temperature(n, a, e_total, eigenfrequencies)?;
    let mu = chemical_potential(n, a, e_total, temperature);
    Ok(ThermalEquilibrium {
        temperature,
        mu,
        occupancies: average_optical_powers(eigenfrequencies, temperature, mu),
    })
}

/// Root of `f` on `[lo, hi]`; the bracket must contain a sign change.
fn bisect(f: impl Fn(f64) -> f64, mut lo: f64, mut hi: f64) -> Result<f64> {
    let mut f_lo = f(lo);
    let f_hi = f(hi);
    if f_lo == 0.0 {
        return Ok(lo);
    }
    if f_hi == 0.0 {
        return Ok(hi);
    }
    if !(f_lo.is_finite() && f_hi.is_finite()) || f_lo.signum() == f_hi.signum() {
        return Err(EcpnError::NumericalFailure(format!(
            "no sign change on [{lo}, {hi}]: f = ({f_lo}, {f_hi})"
        )));
    }

    for _ in 0..MAX_BISECTIONS {
        let mid = 0.5 * (lo + hi);
        let f_mid = f(mid);
        if f_mid == 0.0 || (hi - lo) * 0.5 < XTOL {
            return Ok(mid);
        }
        if f_mid.signum() == f_lo.signum() {
            lo = mid;
            f_lo = f_mid;
        } else {
            hi = mid;
        }
    }
    Err(EcpnError::NumericalFailure(format!("bisection did not converge on [{lo}, {hi}]")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bisect_finds_sqrt_two() {
        let root = bisect(|x| x * x - 2.0, 0.0, 2.0).unwrap();
        assert!((root - 2f64.sqrt()).abs() < 1e-10);
    }

    #[test]
    fn bisect_without_sign_change_fails() {
        assert!(matches!(bisect(|x| x * x + 1.0, -1.0, 1.0), Err(EcpnError::NumericalFailure(_))));
    }
}
