//! One SOI MOSFET instance: topology, resolved parameters and per-iteration state.

use std::sync::Arc;

use soistamp_core::{MatrixSink, MatrixStructure, NodeAllocator};

use super::convergence::{self, ConvergenceState, IterationState};
use super::kernel::{KernelInput, StampSet};
use super::load::{self, AdjointMirror};
use super::mode::{Mode, ModeView};
use super::model::ModelRef;
use super::noise::{NoiseEval, NoiseInput, NoiseState};
use super::op::OperatingPoint;
use super::params::{Features, InstanceParams};
use super::parasitics::Parasitics;
use super::size::{Geometry, SizeCache, SizeDependParams};
use super::topology::{ExternalNodes, StampHandles, Terminal, Topology};
use super::truncation::{self, ChargeKind, StateHistory, TruncationEstimator};
use crate::analysis::{Analysis, NoiseData, NoiseMode, NoiseTransfer};
use crate::error::{Error, Result};
use crate::options::Tolerances;

/// Per-iteration state a caller may save and restore around a trial step.
#[derive(Debug, Clone, PartialEq)]
pub struct SavedIteration {
    op: OperatingPoint,
    mode: Mode,
    evaluated: bool,
    prior: Option<IterationState>,
}

/// A placed device.
#[derive(Debug, Clone)]
pub struct Instance {
    name: String,
    params: InstanceParams,
    features: Features,
    topology: Topology,
    size: Arc<SizeDependParams>,
    parasitics: Parasitics,
    handles: Option<StampHandles>,
    adjoint: Option<AdjointMirror>,
    op: OperatingPoint,
    mode: Mode,
    evaluated: bool,
    prior: Option<IterationState>,
    history: StateHistory,
    noise: NoiseState,
}

impl Instance {
    pub(crate) fn new(
        name: String,
        model: &ModelRef<'_>,
        cache: &mut SizeCache,
        nodes: ExternalNodes,
        params: InstanceParams,
        alloc: &mut dyn NodeAllocator,
    ) -> Result<Self> {
        let features = Features::resolve(model.params, &params, nodes.body.is_some());
        if features.rbody {
            model.params.validate_body_network()?;
        }
        let size = resolve_size(&name, model, cache, &params)?;
        let parasitics = Parasitics::new(&name, model.params, &params, &size, &features);
        let topology = Topology::build(&name, &nodes, &features, alloc);
        Ok(Self {
            name,
            params,
            features,
            topology,
            size,
            parasitics,
            handles: None,
            adjoint: None,
            op: OperatingPoint::default(),
            mode: Mode::Forward,
            evaluated: false,
            prior: None,
            history: StateHistory::new(features.selfheat),
            noise: NoiseState::default(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &InstanceParams {
        &self.params
    }

    pub fn features(&self) -> &Features {
        &self.features
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn size(&self) -> &SizeDependParams {
        &self.size
    }

    /// Shared handle to the size-dependent record.
    pub fn size_arc(&self) -> &Arc<SizeDependParams> {
        &self.size
    }

    pub fn parasitics(&self) -> &Parasitics {
        &self.parasitics
    }

    /// Acquire matrix handles for every position this instance can touch.
    pub fn setup(&mut self, structure: &mut dyn MatrixStructure) {
        let pattern = StampSet::pattern(&self.features, &self.topology);
        self.handles = Some(StampHandles::acquire(&self.topology, &pattern, structure));
    }

    pub fn is_set_up(&self) -> bool {
        self.handles.is_some()
    }

    /// Attach a private mirror matrix that receives a copy of every stamp.
    pub fn enable_adjoint(&mut self) {
        let pattern = StampSet::pattern(&self.features, &self.topology);
        self.adjoint = Some(AdjointMirror::new(&self.topology, &pattern));
    }

    pub fn adjoint(&self) -> Option<&AdjointMirror> {
        self.adjoint.as_ref()
    }

    /// Install a freshly evaluated operating point.
    ///
    /// The previous point becomes the reference for the next convergence
    /// check, and the mode follows the sign of the new `vds`.
    pub fn update_operating_point(&mut self, op: OperatingPoint) {
        if self.evaluated {
            self.prior = Some(IterationState::capture(&self.op, self.mode));
        }
        self.mode = Mode::from_vds(op.bias.vds);
        self.op = op;
        self.evaluated = true;
    }

    /// Override the mode chosen by [`Instance::update_operating_point`].
    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    pub fn operating_point(&self) -> &OperatingPoint {
        &self.op
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn prior(&self) -> Option<&IterationState> {
        self.prior.as_ref()
    }

    /// Physical-coordinate view of the current operating point.
    pub fn view(&self) -> ModeView {
        ModeView::resolve(&self.op, self.mode)
    }

    /// Analysis-agnostic coefficients for the current operating point.
    pub fn stamp_set(&self) -> StampSet {
        let view = self.view();
        StampSet::build(&KernelInput {
            op: &self.op,
            view: &view,
            features: &self.features,
            parasitics: &self.parasitics,
            topology: &self.topology,
        })
    }

    /// Write `set` into `sink` (and the adjoint mirror, if any).
    pub fn apply(&mut self, set: &StampSet, analysis: &Analysis<'_>, sink: &mut dyn MatrixSink) -> Result<()> {
        let handles = self
            .handles
            .as_ref()
            .ok_or_else(|| Error::NotSetUp(self.name.clone()))?;
        load::apply(set, &self.topology, handles, analysis, sink);
        if let Some(mirror) = self.adjoint.as_mut() {
            mirror.restamp(set, &self.topology, analysis);
        }
        Ok(())
    }

    /// Run one analysis step for this instance.
    ///
    /// Matrix analyses stamp into `sink`; a noise analysis evaluates and
    /// records the noise densities instead.
    pub fn load(&mut self, model: &ModelRef<'_>, analysis: &Analysis<'_>, sink: &mut dyn MatrixSink) -> Result<()> {
        match *analysis {
            Analysis::Noise {
                mode,
                data,
                transfer,
            } => {
                self.noise(model, mode, data, transfer);
                Ok(())
            }
            _ => {
                let set = self.stamp_set();
                self.apply(&set, analysis, sink)
            }
        }
    }

    /// Evaluate noise at `data.freq` and fold it into the sweep state.
    pub fn noise(
        &mut self,
        model: &ModelRef<'_>,
        mode: NoiseMode,
        data: &NoiseData,
        transfer: &dyn NoiseTransfer,
    ) -> NoiseEval {
        let view = self.view();
        let eval = NoiseInput {
            model: model.params,
            temp: model.temp.temp,
            size: &self.size,
            parasitics: &self.parasitics,
            features: &self.features,
            topology: &self.topology,
            op: &self.op,
            view: &view,
        }
        .evaluate(data.freq, transfer);
        self.noise.record(eval, mode, data);
        eval
    }

    pub fn noise_state(&self) -> &NoiseState {
        &self.noise
    }

    pub fn reset_noise(&mut self) {
        self.noise.reset();
    }

    /// Compare the current operating point with the linearized prediction
    /// from the previous one.
    pub fn convergence(&self, tol: &Tolerances) -> ConvergenceState {
        let view = self.view();
        let state = convergence::check(&self.op, &view, &self.topology, self.prior.as_ref(), tol);
        if state == ConvergenceState::Failed {
            if let Some(prior) = &self.prior {
                let [channel, junction] =
                    convergence::checks(&self.op, &view, &self.topology, prior, tol);
                log::trace!(
                    "{}: not converged (channel {:e} vs {:e}, junction {:e} vs {:e})",
                    self.name,
                    channel.predicted,
                    channel.actual,
                    junction.predicted,
                    junction.actual
                );
            }
        }
        state
    }

    /// Record the current operating point as an accepted time point.
    pub fn accept_step(&mut self, step: f64) {
        self.history.accept(&self.op, step);
    }

    pub fn history(&self) -> &StateHistory {
        &self.history
    }

    /// Smallest step the estimator allows for any tracked charge.
    pub fn truncation_step(
        &self,
        estimator: &dyn TruncationEstimator,
        step: f64,
    ) -> Option<(f64, ChargeKind)> {
        truncation::instance_step(&self.op, &self.history, estimator, step)
    }

    /// Re-resolve size-dependent data after a temperature change.
    pub(crate) fn resolve_temperature(&mut self, model: &ModelRef<'_>, cache: &mut SizeCache) -> Result<()> {
        self.size = resolve_size(&self.name, model, cache, &self.params)?;
        self.parasitics = Parasitics::new(&self.name, model.params, &self.params, &self.size, &self.features);
        Ok(())
    }

    pub fn save_iteration(&self) -> SavedIteration {
        SavedIteration {
            op: self.op,
            mode: self.mode,
            evaluated: self.evaluated,
            prior: self.prior,
        }
    }

    pub fn restore_iteration(&mut self, saved: SavedIteration) {
        self.op = saved.op;
        self.mode = saved.mode;
        self.evaluated = saved.evaluated;
        self.prior = saved.prior;
    }

    /// Bias voltage of `t` relative to the source prime, after aliasing.
    pub fn terminal_voltage(&self, t: Terminal) -> f64 {
        self.op.bias.voltage(self.topology.canonical(t))
    }
}

fn resolve_size(
    name: &str,
    model: &ModelRef<'_>,
    cache: &mut SizeCache,
    params: &InstanceParams,
) -> Result<Arc<SizeDependParams>> {
    let geom = Geometry {
        l: params.l,
        w: params.w,
        nf: params.nf,
        rth0: params.rth0.unwrap_or(model.params.rth0),
        cth0: params.cth0.unwrap_or(model.params.cth0),
    };
    cache.resolve(&geom, model.params, model.temp).map_err(|fault| {
        log::warn!("{}: {}: {}", model.name, name, fault);
        Error::FatalGeometry {
            model: model.name.to_string(),
            instance: name.to_string(),
            fault,
        }
    })
}
