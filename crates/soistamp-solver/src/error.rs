//! Error types for soistamp-solver.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Device(#[from] soistamp_devices::Error),

    #[error(transparent)]
    Core(#[from] soistamp_core::Error),

    #[error("snapshot holds {expected} instances, registry has {actual}")]
    SnapshotMismatch { expected: usize, actual: usize },

    #[error("noise sweep frequencies must increase: {previous} Hz then {freq} Hz")]
    NonIncreasingFrequency { previous: f64, freq: f64 },
}

impl Error {
    /// Whether the error ends the simulator run.
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::Device(e) => e.is_fatal(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
