//! Analysis pass driver for the soistamp device engine.
//!
//! This crate provides:
//! - [`Engine`]: DC/transient, AC, pole-zero and noise passes over a
//!   registry, with optional rayon-parallel kernel evaluation
//! - [`NoiseSweep`]: frequency-sweep bookkeeping and a per-source summary
//! - [`DividedDifferenceEstimator`]: the default truncation-error estimator
//! - [`IterationSnapshot`]: save and restore per-iteration instance state

pub mod config;
pub mod engine;
pub mod error;
pub mod lte;
pub mod noise;
pub mod snapshot;

pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{Error, Result};
pub use lte::{DividedDifferenceEstimator, IntegrationMethod};
pub use noise::{DenseTransfer, NoiseSummary, NoiseSweep};
pub use snapshot::IterationSnapshot;
