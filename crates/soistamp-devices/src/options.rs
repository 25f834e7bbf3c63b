//! Simulator-wide tolerances consumed by the convergence and truncation checks.

use serde::{Deserialize, Serialize};

/// Tolerance set shared by every instance.
///
/// Defaults follow the usual SPICE option values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tolerances {
    /// Relative tolerance.
    pub reltol: f64,
    /// Absolute current tolerance (A).
    pub abstol: f64,
    /// Absolute voltage tolerance (V).
    pub vntol: f64,
    /// Absolute charge tolerance (C).
    pub chgtol: f64,
    /// Truncation-error overestimation factor.
    pub trtol: f64,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            reltol: 1e-3,
            abstol: 1e-12,
            vntol: 1e-6,
            chgtol: 1e-14,
            trtol: 7.0,
        }
    }
}

impl Tolerances {
    /// Mixed relative/absolute current tolerance for two competing values.
    #[inline]
    pub fn current(&self, a: f64, b: f64) -> f64 {
        self.reltol * a.abs().max(b.abs()) + self.abstol
    }
}
