// observer.rs - Record time-series observables along a trajectory

use crate::coupling::CouplingMatrix;
use crate::error::{EcpnError, Result};
use crate::integrator::Observe;
use crate::run::RunParameters;
use crate::snapshot::Snapshot;
use crate::thermo::{energy_density, magnetization_cplx, power};
use chrono::{DateTime, Utc};
use num_complex::Complex64;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// Sampled series, all of equal length.
#[derive(Debug, Clone, Default)]
pub struct Trajectory {
    pub t: Vec<f64>,
    pub a: Vec<f64>,
    pub h: Vec<f64>,
    pub m_cplx: Vec<Complex64>,
    pub cfgs: Vec<Vec<Complex64>>,
}

impl Trajectory {
    pub fn len(&self) -> usize {
        self.t.len()
    }

    pub fn is_empty(&self) -> bool {
        self.t.is_empty()
    }
}

/// Append-only text log, one line per recorded sample, flushed per write.
pub struct ProgressLog {
    path: PathBuf,
    file: File,
}

impl ProgressLog {
    /// Create (or truncate) the log and write the header lines.
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| EcpnError::io(dir, e))?;
        }
        let file = File::create(path).map_err(|e| EcpnError::io(path, e))?;
        let mut log = Self { path: path.to_path_buf(), file };
        log.write_line(&format!("# PID: {}", std::process::id()))?;
        log.write_line("# (%) (t) (h) (m)")?;
        Ok(log)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_line(&mut self, line: &str) -> Result<()> {
        writeln!(self.file, "{line}")
            .and_then(|_| self.file.flush())
            .map_err(|e| EcpnError::io(&self.path, e))
    }

    fn write_sample(&mut self, progress: f64, t: f64, h: f64, m: f64) -> Result<()> {
        self.write_line(&format_sample(progress, t, h, m))
    }
}

/// `<progress> <t> <h, 9 decimals> <|m|, 3 decimals>`.
pub fn format_sample(progress: f64, t: f64, h: f64, m: f64) -> String {
    format!("{progress:4.3} {t:5.2} {h:10.9} {m:4.3}")
}

/// Samples power, energy density and magnetization every `every` output
/// steps and keeps the full configuration alongside.
pub struct Observer {
    j: CouplingMatrix,
    chi: f64,
    nt: usize,
    every: usize,
    started: DateTime<Utc>,
    trajectory: Trajectory,
    log: Option<ProgressLog>,
}

impl Observer {
    pub fn new(j: CouplingMatrix, chi: f64, nt: usize, every: usize) -> Result<Self> {
        if every == 0 {
            return Err(EcpnError::invalid("every", "log stride must be positive"));
        }
        if nt == 0 {
            return Err(EcpnError::invalid("nt", "number of output times must be positive"));
        }
        Ok(Self {
            j,
            chi,
            nt,
            every,
            started: Utc::now(),
            trajectory: Trajectory::default(),
            log: None,
        })
    }

    /// Attach a progress log at `path`.
    pub fn with_log(mut self, path: &Path) -> Result<Self> {
        self.log = Some(ProgressLog::create(path)?);
        Ok(self)
    }

    pub fn n(&self) -> usize {
        self.j.n()
    }

    pub fn trajectory(&self) -> &Trajectory {
        &self.trajectory
    }

    pub fn log_path(&self) -> Option<&Path> {
        self.log.as_ref().map(ProgressLog::path)
    }

    /// Sample the state if `step` is a multiple of the stride.
    pub fn record(&mut self, step: usize, t: f64, psi: &[Complex64]) -> Result<()> {
        if step % self.every != 0 {
            return Ok(());
        }

        let a = power(psi);
        let h = energy_density(&self.j, self.chi, psi);
        let m = magnetization_cplx(psi);

        self.trajectory.t.push(t);
        self.trajectory.a.push(a);
        self.trajectory.h.push(h);
        self.trajectory.m_cplx.push(m);
        self.trajectory.cfgs.push(psi.to_vec());

        if let Some(log) = self.log.as_mut() {
            log.write_sample(step as f64 / self.nt as f64, t, h, m.norm())?;
        }
        Ok(())
    }

    /// Assemble the snapshot without touching the filesystem.
    pub fn into_snapshot(
        self,
        params: &RunParameters,
        cfg_ini: Vec<Complex64>,
        cfg_fin: Vec<Complex64>,
        metadata: BTreeMap<String, Value>,
    ) -> Snapshot {
        let Trajectory { t, a, h, m_cplx, cfgs } = self.trajectory;
        Snapshot {
            params: params.clone(),
            n: self.j.n(),
            chi: self.chi,
            j: self.j.to_rows(),
            t,
            a,
            h,
            m_cplx,
            cfgs,
            cfg_ini,
            cfg_fin,
            proc_start: self.started,
            proc_end: Utc::now(),
            metadata,
        }
    }

    /// Assemble and persist the snapshot at `path`. A write failure aborts
    /// the run.
    pub fn finalize(
        self,
        params: &RunParameters,
        cfg_ini: Vec<Complex64>,
        cfg_fin: Vec<Complex64>,
        metadata: BTreeMap<String, Value>,
        path: &Path,
    ) -> Result<Snapshot> {
        let snapshot = self.into_snapshot(params, cfg_ini, cfg_fin, metadata);
        snapshot.save(path)?;
        info!(path = %path.display(), samples = snapshot.len(), "snapshot written");
        Ok(snapshot)
    }
}

impl Observe for Observer {
    fn observe(&mut self, step: usize, t: f64, psi: &[Complex64]) -> Result<()> {
        self.record(step, t, psi)
    }
}
