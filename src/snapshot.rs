// snapshot.rs - Persisted run artifact shared by simulation and analysis

use crate::coupling::CouplingMatrix;
use crate::error::{EcpnError, Result};
use crate::run::RunParameters;
use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// File extension of gzip-compressed JSON snapshots.
pub const SNAPSHOT_EXT: &str = "json.gz";

/// Top-level keys owned by `Snapshot`; metadata may not reuse them.
pub const RESERVED_KEYS: [&str; 13] = [
    "params", "n", "chi", "j", "t", "a", "h", "m_cplx", "cfgs", "cfg_ini", "cfg_fin", "proc_start", "proc_end",
];

/// Everything a run leaves behind: parameters, `J`, the sampled trajectory
/// and the boundary configurations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub params: RunParameters,
    pub n: usize,
    pub chi: f64,
    /// Coupling matrix, row-major.
    pub j: Vec<Vec<f64>>,
    pub t: Vec<f64>,
    /// Total power per sample.
    pub a: Vec<f64>,
    /// Energy density per sample.
    pub h: Vec<f64>,
    pub m_cplx: Vec<Complex64>,
    /// Full configuration per sample.
    pub cfgs: Vec<Vec<Complex64>>,
    pub cfg_ini: Vec<Complex64>,
    pub cfg_fin: Vec<Complex64>,
    pub proc_start: DateTime<Utc>,
    pub proc_end: DateTime<Utc>,
    /// Caller-supplied extras merged in at save time; unknown fields of
    /// older or newer snapshots land here too.
    #[serde(flatten)]
    pub metadata: BTreeMap<String, Value>,
}

impl Snapshot {
    /// Number of recorded samples.
    pub fn len(&self) -> usize {
        self.t.len()
    }

    pub fn is_empty(&self) -> bool {
        self.t.is_empty()
    }

    pub fn coupling(&self) -> Result<CouplingMatrix> {
        CouplingMatrix::from_rows(&self.j)
    }

    /// Conventional file name for a run.
    pub fn file_name(params: &RunParameters) -> String {
        format!(
            "obs_dopri5_ecpn_N{}_tmax{:.6}_Nt{}_h0{:.6}.{SNAPSHOT_EXT}",
            params.n,
            params.t_max,
            params.nt - 1,
            params.h0
        )
    }

    /// Write to `path`, creating missing parent directories.
    ///
    /// Metadata keys that collide with a snapshot field are rejected before
    /// anything is written, since the file could not be read back.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(key) = self.metadata.keys().find(|k| RESERVED_KEYS.contains(&k.as_str())) {
            return Err(EcpnError::invalid("metadata", format!("key `{key}` shadows a snapshot field")));
        }
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| EcpnError::io(dir, e))?;
        }
        let file = File::create(path).map_err(|e| EcpnError::io(path, e))?;
        let mut enc = GzEncoder::new(BufWriter::new(file), Compression::default());
        serde_json::to_writer(&mut enc, self)?;
        let mut inner = enc.finish().map_err(|e| EcpnError::io(path, e))?;
        inner.flush().map_err(|e| EcpnError::io(path, e))?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| EcpnError::io(path, e))?;
        let snapshot = serde_json::from_reader(GzDecoder::new(BufReader::new(file)))?;
        Ok(snapshot)
    }
}

/// Snapshot files directly inside `dir`, in name order.
pub fn list_snapshots(dir: &Path) -> Result<Vec<PathBuf>> {
    let suffix = format!(".{SNAPSHOT_EXT}");
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| EcpnError::io(dir, e))? {
        let path = entry.map_err(|e| EcpnError::io(dir, e))?.path();
        let matches = path
            .file_name()
            .and_then(|f| f.to_str())
            .is_some_and(|f| f.ends_with(&suffix));
        if matches && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
