pub mod error;
pub mod coupling;
pub mod spectral;
pub mod thermo;
pub mod heuristic;
pub mod integrator;
pub mod observer;
pub mod snapshot;
pub mod statistics;
pub mod equilibrium;
pub mod run;
pub mod utils;

pub use error::{EcpnError, Result};
