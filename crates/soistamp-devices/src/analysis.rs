//! Analysis descriptors passed to every stamping pass.

use num_complex::Complex64;
use soistamp_core::NodeId;

/// What the current pass is computing.
#[derive(Clone, Copy)]
pub enum Analysis<'a> {
    /// Newton iteration for DC or one transient time point. `ag0` is the
    /// integrator's leading coefficient; zero in DC.
    DcOrTransient { ag0: f64 },
    /// Small-signal AC at angular frequency `omega` (rad/s).
    Ac { omega: f64 },
    /// Pole-zero evaluation at the complex frequency `s`.
    PoleZero { s: Complex64 },
    /// Noise evaluation at one frequency point.
    Noise {
        mode: NoiseMode,
        data: &'a NoiseData,
        transfer: &'a dyn NoiseTransfer,
    },
}

impl std::fmt::Debug for Analysis<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Analysis::DcOrTransient { ag0 } => write!(f, "DcOrTransient {{ ag0: {ag0} }}"),
            Analysis::Ac { omega } => write!(f, "Ac {{ omega: {omega} }}"),
            Analysis::PoleZero { s } => write!(f, "PoleZero {{ s: {s} }}"),
            Analysis::Noise { mode, data, .. } => {
                write!(f, "Noise {{ mode: {mode:?}, freq: {} }}", data.freq)
            }
        }
    }
}

/// Whether a noise pass only reports densities or also integrates them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NoiseMode {
    #[default]
    Density,
    /// Density plus log-log integration over the frequency sweep.
    Integrate,
}

/// Transfer from a current injected between two nodes to the noise output.
pub trait NoiseTransfer: Sync {
    /// Complex transfer for a unit current from `pos` to `neg`.
    fn transfer(&self, pos: NodeId, neg: NodeId) -> Complex64;
}

impl<F> NoiseTransfer for F
where
    F: Fn(NodeId, NodeId) -> Complex64 + Sync,
{
    fn transfer(&self, pos: NodeId, neg: NodeId) -> Complex64 {
        self(pos, neg)
    }
}

/// Frequency-sweep bookkeeping for one noise point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoiseData {
    pub freq: f64,
    pub last_freq: f64,
    pub ln_freq: f64,
    pub ln_last_freq: f64,
    /// Inverse squared gain from the input source to the output.
    pub gain_sq_inv: f64,
    pub ln_gain_inv: f64,
}

impl NoiseData {
    /// First point of a sweep: nothing to integrate yet.
    pub fn first(freq: f64, gain_sq_inv: f64) -> Self {
        Self {
            freq,
            last_freq: freq,
            ln_freq: freq.ln(),
            ln_last_freq: freq.ln(),
            gain_sq_inv,
            ln_gain_inv: gain_sq_inv.ln(),
        }
    }

    /// The point following `self` in the sweep.
    pub fn next(&self, freq: f64, gain_sq_inv: f64) -> Self {
        Self {
            freq,
            last_freq: self.freq,
            ln_freq: freq.ln(),
            ln_last_freq: self.ln_freq,
            gain_sq_inv,
            ln_gain_inv: gain_sq_inv.ln(),
        }
    }

    #[inline]
    pub fn del_freq(&self) -> f64 {
        self.freq - self.last_freq
    }

    #[inline]
    pub fn del_ln_freq(&self) -> f64 {
        self.ln_freq - self.ln_last_freq
    }

    /// No previous point to integrate from.
    #[inline]
    pub fn is_first(&self) -> bool {
        self.del_freq() == 0.0
    }
}
