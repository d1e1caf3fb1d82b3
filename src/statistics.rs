// statistics.rs - Equilibrium observables and error estimates from recorded trajectories

use crate::error::{EcpnError, Result};
use crate::integrator::EquationOfMotion;
use crate::snapshot::Snapshot;
use chrono::{DateTime, Utc};
use csv::WriterBuilder;
use num_complex::Complex64;
use rand::Rng;
use std::f64::consts::{PI, TAU};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::debug;

/// Mean, standard deviation and standard error of the mean.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BasicStats {
    pub mean: f64,
    pub std_dev: f64,
    pub std_err: f64,
}

/// Summary measures via the corrected two-pass algorithm, which subtracts
/// the round-off of the first pass from the sum of squared deviations.
///
/// A constant series (including a single value) has exactly zero spread.
pub fn basic_stats(x: &[f64]) -> Result<BasicStats> {
    let first = *x
        .first()
        .ok_or_else(|| EcpnError::InsufficientData("basic_stats on an empty series".into()))?;
    if x.iter().all(|&v| v == first) {
        return Ok(BasicStats { mean: first, std_dev: 0.0, std_err: 0.0 });
    }

    let n = x.len() as f64;
    let mean = x.iter().sum::<f64>() / n;
    let mut tiny = 0.0;
    let mut var = 0.0;
    for &xi in x {
        let d = xi - mean;
        tiny += d;
        var += d * d;
    }
    let var = ((var - tiny * tiny / n) / (n - 1.0)).max(0.0);
    let std_dev = var.sqrt();
    Ok(BasicStats { mean, std_dev, std_err: std_dev / n.sqrt() })
}

pub fn mean(x: &[f64]) -> f64 {
    x.iter().sum::<f64>() / x.len() as f64
}

/// Population variance (divides by `n`).
pub fn population_variance(x: &[f64]) -> f64 {
    let m = mean(x);
    x.iter().map(|&v| (v - m).powi(2)).sum::<f64>() / x.len() as f64
}

/// Estimator value together with its resampling error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimate {
    pub value: f64,
    pub error: f64,
}

/// Empirical bootstrap: `fun` on the original data, error as the standard
/// deviation of `fun` over `resamples` draws with replacement.
pub fn bootstrap<R, F>(rng: &mut R, x: &[f64], fun: F, resamples: usize) -> Result<Estimate>
where
    R: Rng,
    F: Fn(&[f64]) -> f64,
{
    if x.is_empty() {
        return Err(EcpnError::InsufficientData("bootstrap on an empty series".into()));
    }
    if resamples < 2 {
        return Err(EcpnError::invalid("resamples", format!("need at least two resamples, got {resamples}")));
    }

    let value = fun(x);
    let mut sample = vec![0.0; x.len()];
    let estimates: Vec<f64> = (0..resamples)
        .map(|_| {
            for s in sample.iter_mut() {
                *s = x[rng.gen_range(0..x.len())];
            }
            fun(sample.as_slice())
        })
        .collect();
    let error = basic_stats(&estimates)?.std_dev;
    Ok(Estimate { value, error })
}

/// `<m_{i+lag} m_i> - <m_i><m_{i+lag}>` over the overlapping window.
fn lagged_covariance(m: &[f64], lag: usize) -> f64 {
    let head = &m[..m.len() - lag];
    let tail = &m[lag..];
    let cross = head.iter().zip(tail).map(|(a, b)| a * b).sum::<f64>() / head.len() as f64;
    cross - mean(head) * mean(tail)
}

/// Normalized time-displaced autocorrelation `C(dt) / C(0)`.
///
/// `t` must be evenly spaced; the displacement is rounded to the nearest
/// multiple of the spacing, which is returned alongside.
pub fn autocorrelation(t: &[f64], m: &[f64], displacement: f64) -> Result<(f64, f64)> {
    if t.len() != m.len() {
        return Err(EcpnError::invalid("m", format!("length {} does not match {} times", m.len(), t.len())));
    }
    if t.len() < 2 {
        return Err(EcpnError::InsufficientData("autocorrelation needs at least two samples".into()));
    }
    let spacing = t[1] - t[0];
    if !(spacing > 0.0) {
        return Err(EcpnError::invalid("t", format!("sample times must increase, spacing {spacing}")));
    }
    if !displacement.is_finite() || displacement < 0.0 {
        return Err(EcpnError::invalid("displacement", format!("must be >= 0, got {displacement}")));
    }

    let lag = (displacement / spacing).round() as usize;
    if lag >= m.len() {
        return Err(EcpnError::InsufficientData(format!("lag {lag} exceeds series of length {}", m.len())));
    }

    let c0 = lagged_covariance(m, 0);
    if !(c0 > 0.0) {
        return Err(EcpnError::InsufficientData("autocorrelation of a series without variance".into()));
    }
    Ok((lag as f64 * spacing, lagged_covariance(m, lag) / c0))
}

/// Integrated autocorrelation time with automatic windowing (Sokal).
///
/// Returns 0.5 for uncorrelated or flat data.
pub fn integrated_autocorrelation_time(data: &[f64]) -> f64 {
    let n = data.len();
    if n < 10 {
        return 0.5;
    }
    let c0 = lagged_covariance(data, 0);
    if !(c0 > 0.0) {
        return 0.5;
    }

    let mut tau = 0.5;
    for lag in 1..n / 4 {
        let rho = lagged_covariance(data, lag) / c0;
        tau += rho;
        if lag as f64 >= 6.0 * tau || (rho.abs() < 0.05 && lag > 10) {
            break;
        }
    }
    tau.max(0.5)
}

/// Binder cumulant `1 - <|m|^4> / (3 <|m|^2>^2)`.
pub fn binder_parameter(m: &[f64]) -> Result<f64> {
    if m.is_empty() {
        return Err(EcpnError::InsufficientData("Binder parameter of an empty series".into()));
    }
    let n = m.len() as f64;
    let s4 = m.iter().map(|v| v.abs().powi(4)).sum::<f64>() / n;
    let s2 = m.iter().map(|v| v.abs().powi(2)).sum::<f64>() / n;
    if s2 == 0.0 {
        return Err(EcpnError::InsufficientData("Binder parameter of a vanishing series".into()));
    }
    Ok(1.0 - s4 / (s2 * s2) / 3.0)
}

/// Wrap an angle into `(-pi, pi]`.
pub fn wrap_phase(x: f64) -> f64 {
    let w = (x + PI).rem_euclid(TAU) - PI;
    if w <= -PI {
        w + TAU
    } else {
        w
    }
}

/// Angular-velocity statistics of one configuration.
#[derive(Debug, Clone)]
pub struct AngularSample {
    /// Mean angular velocity over modes.
    pub mean_velocity: f64,
    /// Mean squared deviation of mode angular velocities from the mean.
    pub dispersion: f64,
    /// Mode phases relative to the magnetization phase.
    pub phase_offsets: Vec<f64>,
}

/// Split each mode's rate of change into radial and angular parts and
/// summarize the angular one.
pub fn angular_dynamics(eom: &EquationOfMotion<'_>, psi: &[Complex64], m_cplx: Complex64) -> AngularSample {
    let ds = eom.rate_of_change(psi);
    let m_phase = m_cplx.arg();
    let n = psi.len() as f64;

    let mut velocity = Vec::with_capacity(psi.len());
    let mut phase_offsets = Vec::with_capacity(psi.len());
    for (p, d) in psi.iter().zip(&ds) {
        let (sin_a, cos_a) = p.arg().sin_cos();
        velocity.push(-d.re * sin_a + d.im * cos_a);
        phase_offsets.push(wrap_phase(p.arg() - m_phase));
    }

    let mean_velocity = velocity.iter().sum::<f64>() / n;
    let dispersion = velocity.iter().map(|v| (v - mean_velocity).powi(2)).sum::<f64>() / n;
    AngularSample { mean_velocity, dispersion, phase_offsets }
}

/// Post-processing settings.
#[derive(Debug, Clone, Copy)]
pub struct AnalysisConfig {
    /// Samples with `t <= t_eq` are discarded.
    pub t_eq: f64,
    pub resamples: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self { t_eq: 0.0, resamples: 32 }
    }
}

/// One output row per snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SummaryRow {
    pub h: f64,
    pub mse_av: f64,
    pub mse_serr: f64,
    pub m_av: f64,
    pub m_serr: f64,
    pub chi: f64,
    pub chi_err: f64,
    pub theta_av: f64,
    pub theta_var: f64,
    pub theta_var_err: f64,
}

impl SummaryRow {
    pub const COLUMNS: [&'static str; 10] = [
        "h", "mse_av", "mse_sErr", "m_av", "m_sErr", "chi", "chi_err", "theta_av", "theta_var", "theta_var_err",
    ];

    fn fields(&self) -> [f64; 10] {
        [
            self.h, self.mse_av, self.mse_serr, self.m_av, self.m_serr,
            self.chi, self.chi_err, self.theta_av, self.theta_var, self.theta_var_err,
        ]
    }
}

/// Row plus diagnostics that do not go into the table.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub row: SummaryRow,
    pub samples: usize,
    pub binder: f64,
    pub tau_int: f64,
}

/// Reduce a snapshot to its summary row.
pub fn analyze(snapshot: &Snapshot, cfg: &AnalysisConfig, rng: &mut impl Rng) -> Result<Analysis> {
    let len = snapshot.t.len();
    if snapshot.m_cplx.len() != len || snapshot.cfgs.len() != len {
        return Err(EcpnError::invalid(
            "snapshot",
            format!("series lengths differ: t {len}, m_cplx {}, cfgs {}", snapshot.m_cplx.len(), snapshot.cfgs.len()),
        ));
    }

    let j = snapshot.coupling()?;
    if snapshot.n != j.n() {
        return Err(EcpnError::invalid(
            "snapshot",
            format!("n = {} does not match coupling size {}", snapshot.n, j.n()),
        ));
    }
    if let Some(bad) = snapshot.cfgs.iter().position(|c| c.len() != j.n()) {
        return Err(EcpnError::invalid(
            "snapshot",
            format!("configuration {bad} has {} modes, expected {}", snapshot.cfgs[bad].len(), j.n()),
        ));
    }
    let eom = EquationOfMotion::new(&j, snapshot.chi);
    let n = snapshot.n as f64;

    let kept: Vec<usize> = (0..len).filter(|&i| snapshot.t[i] > cfg.t_eq).collect();
    if kept.is_empty() {
        return Err(EcpnError::InsufficientData(format!("no samples after t_eq = {}", cfg.t_eq)));
    }

    let m: Vec<f64> = kept.iter().map(|&i| snapshot.m_cplx[i].norm()).collect();
    let mut dispersion = Vec::with_capacity(kept.len());
    let mut theta = Vec::with_capacity(kept.len() * snapshot.n);
    for &i in &kept {
        let sample = angular_dynamics(&eom, &snapshot.cfgs[i], snapshot.m_cplx[i]);
        dispersion.push(sample.dispersion);
        theta.extend(sample.phase_offsets);
    }

    let m_stats = basic_stats(&m)?;
    let chi = bootstrap(rng, &m, |x| n * population_variance(x), cfg.resamples)?;
    let mse = basic_stats(&dispersion)?;
    let theta_av = mean(&theta);
    let theta_var = bootstrap(rng, &theta, population_variance, cfg.resamples)?;

    let binder = binder_parameter(&m)?;
    let tau_int = integrated_autocorrelation_time(&m);
    debug!(h0 = snapshot.params.h0, samples = kept.len(), binder, tau_int, "snapshot analyzed");

    Ok(Analysis {
        row: SummaryRow {
            h: snapshot.params.h0,
            mse_av: mse.mean,
            mse_serr: mse.std_err,
            m_av: m_stats.mean,
            m_serr: m_stats.std_err,
            chi: chi.value,
            chi_err: chi.error,
            theta_av,
            theta_var: theta_var.value,
            theta_var_err: theta_var.error,
        },
        samples: kept.len(),
        binder,
        tau_int,
    })
}

/// Provenance lines written above the table.
#[derive(Debug, Clone)]
pub struct SummaryHeader {
    pub script: String,
    pub data_path: String,
    pub t_eq: f64,
    pub timestamp: DateTime<Utc>,
}

/// Write `#`-commented provenance and one whitespace-separated row per run,
/// sorted by target energy density.
pub fn write_summary<W: Write>(mut out: W, header: &SummaryHeader, rows: &[SummaryRow]) -> std::io::Result<()> {
    writeln!(out, "# ANALYSIS SCRIPT: {}", header.script)?;
    writeln!(out, "# PATH TO RAW DATA: {}", header.data_path)?;
    writeln!(out, "# EQUILIBRATION TIME: t_eq = {:.6}", header.t_eq)?;
    writeln!(out, "# TIMESTAMP: {}", header.timestamp)?;
    let cols: Vec<String> = SummaryRow::COLUMNS.iter().map(|c| format!("({c})")).collect();
    writeln!(out, "# {}", cols.join(" "))?;

    let mut sorted = rows.to_vec();
    sorted.sort_by(|a, b| a.h.total_cmp(&b.h));

    let mut wtr = WriterBuilder::new().delimiter(b' ').has_headers(false).from_writer(out);
    for row in &sorted {
        wtr.write_record(row.fields().iter().map(|v| v.to_string()))?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_summary_file(path: &Path, header: &SummaryHeader, rows: &[SummaryRow]) -> Result<()> {
    let file = File::create(path).map_err(|e| EcpnError::io(path, e))?;
    write_summary(BufWriter::new(file), header, rows).map_err(|e| EcpnError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_phase_half_open_interval() {
        assert_eq!(wrap_phase(PI), PI);
        assert_eq!(wrap_phase(-PI), PI);
        assert!((wrap_phase(3.0 * PI / 2.0) + PI / 2.0).abs() < 1e-12);
        assert!((wrap_phase(0.25) - 0.25).abs() < 1e-15);
    }

    #[test]
    fn lagged_covariance_zero_lag_is_population_variance() {
        let x = [1.0, 2.0, 4.0, 8.0];
        assert!((lagged_covariance(&x, 0) - population_variance(&x)).abs() < 1e-12);
    }
}
