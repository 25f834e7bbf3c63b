//! Pass-driver configuration.

use serde::{Deserialize, Serialize};

/// How the engine schedules per-instance work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Evaluate stamp kernels and truncation estimates on the rayon pool.
    pub parallel: bool,
    /// Minimum instance count for the parallel path (below this, sequential
    /// is faster).
    pub min_parallel: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            min_parallel: 64,
        }
    }
}

impl EngineConfig {
    /// Always run sequentially.
    pub fn sequential() -> Self {
        Self {
            parallel: false,
            ..Self::default()
        }
    }

    pub fn with_min_parallel(mut self, min: usize) -> Self {
        self.min_parallel = min;
        self
    }
}
