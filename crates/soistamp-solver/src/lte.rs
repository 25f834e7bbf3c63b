//! Divided-difference local-truncation-error estimator.
//!
//! The error of an order-`k` integrator is proportional to the `(k+1)`-th
//! derivative of the integrated charge, estimated here by divided
//! differences over the present point and `k+1` accepted points.

use serde::{Deserialize, Serialize};
use soistamp_devices::soi::TruncationSample;
use soistamp_devices::{Tolerances, TruncationEstimator};

/// Integration formula used by the transient loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum IntegrationMethod {
    /// Backward Euler (first order).
    #[default]
    BackwardEuler,
    /// Trapezoidal (second order).
    Trapezoidal,
}

impl IntegrationMethod {
    pub fn order(self) -> usize {
        match self {
            IntegrationMethod::BackwardEuler => 1,
            IntegrationMethod::Trapezoidal => 2,
        }
    }

    /// Error constant of the formula.
    fn error_coefficient(self) -> f64 {
        match self {
            IntegrationMethod::BackwardEuler => 0.5,
            IntegrationMethod::Trapezoidal => 1.0 / 12.0,
        }
    }
}

/// Default estimator for the timestep controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DividedDifferenceEstimator {
    pub method: IntegrationMethod,
    pub tolerances: Tolerances,
}

impl DividedDifferenceEstimator {
    pub fn new(method: IntegrationMethod, tolerances: Tolerances) -> Self {
        Self { method, tolerances }
    }

    fn tolerance(&self, sample: &TruncationSample<'_>) -> f64 {
        let tol = &self.tolerances;
        let previous = sample.past[0];
        let current_tol = tol.abstol
            + tol.reltol * sample.present.current.abs().max(previous.current.abs());
        let charge = sample.present.charge.abs().max(previous.charge.abs());
        let charge_tol = tol.reltol * charge.max(tol.chgtol) / sample.step;
        current_tol.max(charge_tol)
    }
}

impl TruncationEstimator for DividedDifferenceEstimator {
    fn max_step(&self, sample: &TruncationSample<'_>) -> f64 {
        let order = self.method.order();
        if sample.past.len() < order + 1 || sample.past_steps.len() < order || sample.step <= 0.0 {
            return f64::INFINITY;
        }

        // Step sizes newest first: the trial step, then accepted ones.
        let mut deltas = [0.0; 3];
        deltas[0] = sample.step;
        deltas[1..=order].copy_from_slice(&sample.past_steps[..order]);

        let mut diff = [0.0; 4];
        diff[0] = sample.present.charge;
        for (d, past) in diff[1..=order + 1].iter_mut().zip(sample.past) {
            *d = past.charge;
        }

        let mut span = deltas;
        let mut j = order;
        loop {
            for i in 0..=j {
                diff[i] = (diff[i] - diff[i + 1]) / span[i];
            }
            if j == 0 {
                break;
            }
            j -= 1;
            for i in 0..=j {
                span[i] = span[i + 1] + deltas[i];
            }
        }

        let tol = &self.tolerances;
        let denom = tol.abstol.max(self.method.error_coefficient() * diff[0].abs());
        let del = tol.trtol * self.tolerance(sample) / denom;
        match order {
            1 => del,
            2 => del.sqrt(),
            k => del.powf(1.0 / k as f64),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use soistamp_devices::soi::{ChargeKind, truncation::ChargeSample};

    fn sample_of<'a>(
        q: impl Fn(f64) -> f64,
        times: &[f64],
        past: &'a mut Vec<ChargeSample>,
        steps: &'a mut Vec<f64>,
    ) -> TruncationSample<'a> {
        // times newest first
        past.clear();
        steps.clear();
        for &t in &times[1..] {
            past.push(ChargeSample {
                charge: q(t),
                current: 0.0,
            });
        }
        for w in times[1..].windows(2) {
            steps.push(w[0] - w[1]);
        }
        TruncationSample {
            kind: ChargeKind::Gate,
            present: ChargeSample {
                charge: q(times[0]),
                current: 0.0,
            },
            past,
            past_steps: steps,
            step: times[0] - times[1],
        }
    }

    #[test]
    fn test_backward_euler_quadratic_charge() {
        let tol = Tolerances::default();
        let est = DividedDifferenceEstimator::new(IntegrationMethod::BackwardEuler, tol);
        let c = 1e-3;
        let (mut past, mut steps) = (Vec::new(), Vec::new());
        let times = [3e-9, 2e-9, 1.5e-9, 1e-9];
        let s = sample_of(|t| c * t * t, &times, &mut past, &mut steps);

        // Second divided difference of c·t² is c.
        let charge = (c * 9e-18f64).max(c * 4e-18);
        let tolerance = (tol.abstol).max(tol.reltol * charge.max(tol.chgtol) / 1e-9);
        let expected = tol.trtol * tolerance / tol.abstol.max(0.5 * c);
        assert_relative_eq!(est.max_step(&s), expected, max_relative = 1e-6);
    }

    #[test]
    fn test_trapezoidal_cubic_charge() {
        let tol = Tolerances::default();
        let est = DividedDifferenceEstimator::new(IntegrationMethod::Trapezoidal, tol);
        let c = 1e6;
        let (mut past, mut steps) = (Vec::new(), Vec::new());
        let times = [4e-9, 3e-9, 2.5e-9, 1e-9];
        let s = sample_of(|t| c * t * t * t, &times, &mut past, &mut steps);

        let charge = (c * 64e-27f64).max(c * 27e-27);
        let tolerance = (tol.abstol).max(tol.reltol * charge.max(tol.chgtol) / 1e-9);
        let expected = (tol.trtol * tolerance / tol.abstol.max(c / 12.0)).sqrt();
        assert_relative_eq!(est.max_step(&s), expected, max_relative = 1e-6);
    }

    #[test]
    fn test_linear_charge_is_loosely_bounded() {
        let tol = Tolerances::default();
        let est = DividedDifferenceEstimator::new(IntegrationMethod::BackwardEuler, tol);
        let (mut past, mut steps) = (Vec::new(), Vec::new());
        let times = [3e-9, 2e-9, 1e-9];
        let s = sample_of(|t| 1e-6 * t, &times, &mut past, &mut steps);
        assert!(est.max_step(&s) > 1e-6);
    }

    #[test]
    fn test_short_history_is_unbounded() {
        let est = DividedDifferenceEstimator::new(IntegrationMethod::Trapezoidal, Tolerances::default());
        let (mut past, mut steps) = (Vec::new(), Vec::new());
        let times = [2e-9, 1e-9, 0.0];
        let s = sample_of(|t| t * t, &times, &mut past, &mut steps);
        assert_eq!(est.max_step(&s), f64::INFINITY);
    }
}
