//! Convergence Checker: compare the linearized prediction from the previous
//! iteration with the freshly evaluated currents.

use super::mode::{Mode, ModeView};
use super::op::{Bias, OperatingPoint};
use super::topology::{Terminal, Topology};
use crate::options::Tolerances;

/// Per-instance convergence state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConvergenceState {
    /// No previous iteration to compare against yet.
    #[default]
    Testing,
    Converged,
    Failed,
}

/// What the next iteration's prediction starts from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IterationState {
    /// Physical channel current, drain prime to source prime.
    pub ids: f64,
    /// `ibs + ibd`.
    pub junction: f64,
    pub bias: Bias,
}

impl IterationState {
    pub fn capture(op: &OperatingPoint, mode: Mode) -> Self {
        Self {
            ids: mode.sign() * op.ids,
            junction: op.ibs + op.ibd,
            bias: op.bias,
        }
    }
}

/// Result of a convergence pass over many instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConvergenceReport {
    pub converged: bool,
    /// Instances that failed (the pass stops at the first one).
    pub noncon: usize,
}

/// Predicted and evaluated value of one checked current.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurrentCheck {
    pub predicted: f64,
    pub actual: f64,
    pub tolerance: f64,
}

impl CurrentCheck {
    fn new(predicted: f64, actual: f64, tol: &Tolerances) -> Self {
        Self {
            predicted,
            actual,
            tolerance: tol.current(predicted, actual),
        }
    }

    #[inline]
    pub fn passes(&self) -> bool {
        (self.predicted - self.actual).abs() < self.tolerance
    }
}

/// Channel and junction checks for one instance.
pub fn checks(
    op: &OperatingPoint,
    view: &ModeView,
    topology: &Topology,
    prior: &IterationState,
    tol: &Tolerances,
) -> [CurrentCheck; 2] {
    let now = &op.bias;
    let was = &prior.bias;

    let dvgs = now.vgs - was.vgs;
    let dvds = now.vds - was.vds;
    let dvbs = now.vbs - was.vbs;
    let dves = now.ves - was.ves;
    let dt = now.delta_t - was.delta_t;

    let channel = prior.ids
        + view.gm * dvgs
        + view.gmbs * dvbs
        + view.gme * dves
        + (view.gds + view.rev_sum) * dvds
        + view.gmt * dt;

    let junction_v = |b: &Bias| {
        let vbs = b.voltage(topology.canonical(Terminal::Sb));
        let vbd = b.voltage(topology.canonical(Terminal::Db)) - b.vds;
        (vbs, vbd)
    };
    let (vbs_now, vbd_now) = junction_v(now);
    let (vbs_was, vbd_was) = junction_v(was);
    let junction = prior.junction
        + op.gbs * (vbs_now - vbs_was)
        + op.gbd * (vbd_now - vbd_was)
        + (op.gbst + op.gbdt) * dt;

    [
        CurrentCheck::new(channel, view.ids, tol),
        CurrentCheck::new(junction, op.ibs + op.ibd, tol),
    ]
}

/// Classify one instance.
pub fn check(
    op: &OperatingPoint,
    view: &ModeView,
    topology: &Topology,
    prior: Option<&IterationState>,
    tol: &Tolerances,
) -> ConvergenceState {
    let Some(prior) = prior else {
        return ConvergenceState::Testing;
    };
    if checks(op, view, topology, prior, tol).iter().all(CurrentCheck::passes) {
        ConvergenceState::Converged
    } else {
        ConvergenceState::Failed
    }
}
