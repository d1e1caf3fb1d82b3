// error.rs - Error type shared by the simulation and analysis stages

use std::path::PathBuf;
use thiserror::Error;

/// Failures surfaced by the ECPN pipeline.
///
/// Every variant is fatal for the run that produced it. Nothing in the crate
/// retries: with identical seeds and parameters a retry reproduces the failure.
#[derive(Debug, Error)]
pub enum EcpnError {
    /// A caller-supplied value lies outside the domain of the operation.
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    /// Integrator non-convergence or a root bracket without sign change.
    #[error("numerical failure: {0}")]
    NumericalFailure(String),

    /// A statistic was requested on a series too short (or too flat) for it.
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    /// Reading or writing a log, snapshot or summary failed.
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Snapshot (de)serialization failed.
    #[error("snapshot encoding failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EcpnError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter { name, reason: reason.into() }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}

pub type Result<T> = std::result::Result<T, EcpnError>;
