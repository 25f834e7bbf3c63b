//! Charge history and the truncation-error timestep controller.
//!
//! The history holds accepted time points only; it is appended by
//! [`StateHistory::accept`] once a step is accepted and never by a stamp.

use super::op::OperatingPoint;

/// Accepted points kept per charge quantity.
pub const HISTORY_DEPTH: usize = 3;

/// SPICE-style ratio below which a suggested step rejects the current one.
pub const STEP_REJECT_RATIO: f64 = 0.9;

/// Tracked charge quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChargeKind {
    Gate,
    Bulk,
    Drain,
    /// Only tracked with self-heating.
    Thermal,
}

impl ChargeKind {
    pub const ALL: [ChargeKind; 4] = [
        ChargeKind::Gate,
        ChargeKind::Bulk,
        ChargeKind::Drain,
        ChargeKind::Thermal,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Charge and its time derivative at one time point.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ChargeSample {
    pub charge: f64,
    pub current: f64,
}

impl ChargeSample {
    /// Sample of `kind` from an operating point.
    pub fn of(op: &OperatingPoint, kind: ChargeKind) -> Self {
        let q = &op.charges;
        let cq = &op.charge_currents;
        match kind {
            ChargeKind::Gate => Self {
                charge: q.gate,
                current: cq.gate + cq.gate_overlap,
            },
            ChargeKind::Bulk => Self {
                charge: q.body,
                current: cq.body,
            },
            ChargeKind::Drain => Self {
                charge: q.drain,
                current: cq.drain,
            },
            ChargeKind::Thermal => Self {
                charge: q.thermal,
                current: cq.thermal,
            },
        }
    }
}

/// Fixed-depth newest-first ring.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Ring<T: Copy + Default> {
    values: [T; HISTORY_DEPTH],
    len: usize,
}

impl<T: Copy + Default> Default for Ring<T> {
    fn default() -> Self {
        Self {
            values: [T::default(); HISTORY_DEPTH],
            len: 0,
        }
    }
}

impl<T: Copy + Default> Ring<T> {
    fn push(&mut self, value: T) {
        self.values.copy_within(0..HISTORY_DEPTH - 1, 1);
        self.values[0] = value;
        self.len = (self.len + 1).min(HISTORY_DEPTH);
    }

    fn as_slice(&self) -> &[T] {
        &self.values[..self.len]
    }
}

/// Accepted-point history of one instance.
#[derive(Debug, Clone, PartialEq)]
pub struct StateHistory {
    rings: [Ring<ChargeSample>; 4],
    steps: Ring<f64>,
    thermal: bool,
}

impl StateHistory {
    pub fn new(thermal: bool) -> Self {
        Self {
            rings: Default::default(),
            steps: Ring::default(),
            thermal,
        }
    }

    /// Whether `kind` is tracked for this instance.
    #[inline]
    pub fn tracks(&self, kind: ChargeKind) -> bool {
        kind != ChargeKind::Thermal || self.thermal
    }

    /// Append the accepted point `op`, reached with step `step`.
    pub fn accept(&mut self, op: &OperatingPoint, step: f64) {
        for kind in ChargeKind::ALL {
            if self.tracks(kind) {
                self.rings[kind.index()].push(ChargeSample::of(op, kind));
            }
        }
        self.steps.push(step);
    }

    /// Accepted samples of `kind`, newest first.
    pub fn past(&self, kind: ChargeKind) -> &[ChargeSample] {
        self.rings[kind.index()].as_slice()
    }

    /// Accepted step sizes, newest first.
    pub fn steps(&self) -> &[f64] {
        self.steps.as_slice()
    }

    pub fn clear(&mut self) {
        *self = Self::new(self.thermal);
    }
}

/// Input to a truncation-error estimate for one charge quantity.
#[derive(Debug, Clone, Copy)]
pub struct TruncationSample<'a> {
    pub kind: ChargeKind,
    /// Value at the trial point.
    pub present: ChargeSample,
    /// Accepted values, newest first.
    pub past: &'a [ChargeSample],
    /// Accepted step sizes, newest first.
    pub past_steps: &'a [f64],
    /// Step that produced the trial point.
    pub step: f64,
}

/// Local-truncation-error estimator.
pub trait TruncationEstimator: Sync {
    /// Largest step that keeps the error of `sample` in tolerance.
    /// `f64::INFINITY` when the sample imposes no bound.
    fn max_step(&self, sample: &TruncationSample<'_>) -> f64;
}

impl<F> TruncationEstimator for F
where
    F: Fn(&TruncationSample<'_>) -> f64 + Sync,
{
    fn max_step(&self, sample: &TruncationSample<'_>) -> f64 {
        self(sample)
    }
}

/// Which instance and quantity bound the step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepLimit {
    pub instance: String,
    pub kind: ChargeKind,
}

/// Result of a timestep pass.
#[derive(Debug, Clone, PartialEq)]
pub struct TimestepReport {
    /// Smallest step allowed by any instance; `f64::INFINITY` if unconstrained.
    pub suggested_step: f64,
    pub limited_by: Option<StepLimit>,
}

impl Default for TimestepReport {
    fn default() -> Self {
        Self {
            suggested_step: f64::INFINITY,
            limited_by: None,
        }
    }
}

impl TimestepReport {
    /// Fold in one estimate; only ever reduces the suggestion.
    ///
    /// A NaN estimate wins over any number and then sticks, so an anomaly
    /// from the estimator reaches the caller instead of reading as unlimited.
    pub fn offer(&mut self, step: f64, instance: &str, kind: ChargeKind) {
        if tighter(step, self.suggested_step) {
            self.suggested_step = step;
            self.limited_by = Some(StepLimit {
                instance: instance.to_string(),
                kind,
            });
        }
    }

    /// Whether the step just taken should be rejected and retried.
    pub fn rejects(&self, step: f64) -> bool {
        self.suggested_step.is_nan() || self.suggested_step < STEP_REJECT_RATIO * step
    }
}

fn tighter(candidate: f64, current: f64) -> bool {
    !current.is_nan() && (candidate.is_nan() || candidate < current)
}

/// Smallest step over every tracked quantity of one instance.
pub fn instance_step(
    op: &OperatingPoint,
    history: &StateHistory,
    estimator: &dyn TruncationEstimator,
    step: f64,
) -> Option<(f64, ChargeKind)> {
    let mut best: Option<(f64, ChargeKind)> = None;
    for kind in ChargeKind::ALL {
        if !history.tracks(kind) {
            continue;
        }
        let sample = TruncationSample {
            kind,
            present: ChargeSample::of(op, kind),
            past: history.past(kind),
            past_steps: history.steps(),
            step,
        };
        let h = estimator.max_step(&sample);
        if best.map_or(true, |(b, _)| tighter(h, b)) {
            best = Some((h, kind));
        }
    }
    best
}
