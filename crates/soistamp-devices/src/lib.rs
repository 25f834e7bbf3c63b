//! SOI MOSFET device evaluation and stamping for Soistamp.
//!
//! This crate turns externally evaluated operating points into:
//! - Matrix and right-hand-side contributions for DC/transient, AC and
//!   pole-zero analyses
//! - Per-source noise densities with log-log integration over a sweep
//! - Per-instance Newton convergence verdicts
//! - Truncation-error bounds on the next time step
//!
//! Instances are grouped under models in a [`Registry`], which drives the
//! per-instance pass loop.

pub mod analysis;
pub mod error;
pub mod options;
pub mod registry;
pub mod soi;

pub use analysis::{Analysis, NoiseData, NoiseMode, NoiseTransfer};
pub use error::{Error, Result};
pub use options::Tolerances;
pub use registry::{PassSummary, Registry};
pub use soi::{
    ConvergenceReport, ConvergenceState, ExternalNodes, Instance, InstanceParams, Model,
    ModelParams, OperatingPoint, StampSet, Terminal, TimestepReport, TruncationEstimator,
};
