//! Noise frequency-sweep driver and per-source summary.
//!
//! The caller solves the adjoint (output-sensitivity) system at each
//! frequency; this module hands that solution to every instance as the
//! noise transfer, advances the log-log integration state and collects the
//! results by stable source index.

use nalgebra::DVector;
use num_complex::Complex64;
use soistamp_core::NodeId;
use soistamp_devices::soi::noise::TOTAL_NAME;
use soistamp_devices::soi::{NoiseSource, NUM_NOISE_SOURCES};
use soistamp_devices::{NoiseData, NoiseMode, NoiseTransfer, Registry};

use crate::error::{Error, Result};

/// Transfer from the adjoint solution: the output response to a unit
/// current from `pos` to `neg` is `x[pos] - x[neg]`.
#[derive(Debug, Clone)]
pub struct DenseTransfer {
    adjoint: DVector<Complex64>,
}

impl DenseTransfer {
    pub fn new(adjoint: DVector<Complex64>) -> Self {
        Self { adjoint }
    }

    fn at(&self, node: NodeId) -> Complex64 {
        node.index()
            .and_then(|i| self.adjoint.get(i).copied())
            .unwrap_or_default()
    }
}

impl NoiseTransfer for DenseTransfer {
    fn transfer(&self, pos: NodeId, neg: NodeId) -> Complex64 {
        self.at(pos) - self.at(neg)
    }
}

/// Noise of the whole registry at one frequency, plus the integrated totals
/// so far.
#[derive(Debug, Clone, PartialEq)]
pub struct NoiseSummary {
    pub freq: f64,
    /// Output density per source, summed over instances (V²/Hz).
    pub density: [f64; NUM_NOISE_SOURCES],
    pub total_density: f64,
    /// Integrated output noise per source, total last (V²).
    pub output: [f64; NUM_NOISE_SOURCES + 1],
    /// Integrated input-referred noise per source, total last.
    pub input: [f64; NUM_NOISE_SOURCES + 1],
}

impl NoiseSummary {
    fn empty(freq: f64) -> Self {
        Self {
            freq,
            density: [0.0; NUM_NOISE_SOURCES],
            total_density: 0.0,
            output: [0.0; NUM_NOISE_SOURCES + 1],
            input: [0.0; NUM_NOISE_SOURCES + 1],
        }
    }

    /// Name of summary slot `index`; the last slot is the total.
    pub fn name(index: usize) -> Option<&'static str> {
        match index {
            i if i < NUM_NOISE_SOURCES => Some(NoiseSource::ALL[i].name()),
            NUM_NOISE_SOURCES => Some(TOTAL_NAME),
            _ => None,
        }
    }

    /// `(name, integrated output, integrated input)` for every slot.
    pub fn integrated(&self) -> impl Iterator<Item = (&'static str, f64, f64)> + '_ {
        (0..=NUM_NOISE_SOURCES).filter_map(move |i| {
            Self::name(i).map(|name| (name, self.output[i], self.input[i]))
        })
    }

    /// Source with the largest density at this frequency.
    pub fn dominant(&self) -> Option<NoiseSource> {
        NoiseSource::ALL
            .into_iter()
            .filter(|s| self.density[s.index()] > 0.0)
            .max_by(|a, b| self.density[a.index()].total_cmp(&self.density[b.index()]))
    }
}

/// Frequency-sweep state.
#[derive(Debug, Clone)]
pub struct NoiseSweep {
    mode: NoiseMode,
    data: Option<NoiseData>,
}

impl NoiseSweep {
    /// Start a sweep; clears every instance's integration state.
    pub fn new(mode: NoiseMode, registry: &mut Registry) -> Self {
        registry.reset_noise();
        Self { mode, data: None }
    }

    pub fn mode(&self) -> NoiseMode {
        self.mode
    }

    /// Evaluate every instance at `freq`.
    ///
    /// `gain_sq_inv` is the inverse squared gain from the input source to
    /// the output at this frequency. Frequencies must increase.
    pub fn step(
        &mut self,
        registry: &mut Registry,
        freq: f64,
        gain_sq_inv: f64,
        transfer: &dyn NoiseTransfer,
    ) -> Result<NoiseSummary> {
        let data = match &self.data {
            None => NoiseData::first(freq, gain_sq_inv),
            Some(prev) if freq > prev.freq => prev.next(freq, gain_sq_inv),
            Some(prev) => {
                return Err(Error::NonIncreasingFrequency {
                    previous: prev.freq,
                    freq,
                });
            }
        };
        self.data = Some(data);

        let mode = self.mode;
        let mut summary = NoiseSummary::empty(freq);
        registry.for_each_instance_mut(|model, inst| {
            let eval = inst.noise(&model, mode, &data, transfer);
            for (sum, d) in summary.density.iter_mut().zip(eval.density) {
                *sum += d;
            }
            summary.total_density += eval.total;
            let state = inst.noise_state();
            for i in 0..=NUM_NOISE_SOURCES {
                summary.output[i] += state.output[i];
                summary.input[i] += state.input[i];
            }
            Ok(())
        })?;
        Ok(summary)
    }
}
