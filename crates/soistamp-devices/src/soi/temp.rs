//! Model-level temperature state.

use super::params::{KB, Q};

/// Temperature-dependent quantities shared by every instance of a model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelTemp {
    /// Ambient device temperature (K).
    pub temp: f64,
    /// Thermal voltage kT/q at `temp` (V).
    pub vtm: f64,
    /// `temp / tnom`.
    pub tratio: f64,
    /// `temp - tnom` (K).
    pub delta_t: f64,
}

impl ModelTemp {
    /// Temperature state at `temp` for a model measured at `tnom`.
    pub fn new(temp: f64, tnom: f64) -> Self {
        Self {
            temp,
            vtm: KB * temp / Q,
            tratio: temp / tnom,
            delta_t: temp - tnom,
        }
    }

    /// Thermal voltage at an instance temperature rise `rise` above ambient.
    #[inline]
    pub fn vtm_at(&self, rise: f64) -> f64 {
        KB * (self.temp + rise) / Q
    }
}
