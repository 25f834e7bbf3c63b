//! SOI MOSFET device: parameters, topology, stamps and per-instance state.
//!
//! The compact-model equations live outside this crate. An external
//! evaluator produces an [`OperatingPoint`] in forward-mode coordinates;
//! everything here turns that point into matrix entries, noise densities,
//! convergence verdicts and timestep limits.

pub mod convergence;
pub mod instance;
pub mod kernel;
pub mod load;
pub mod mode;
pub mod model;
pub mod noise;
pub mod op;
pub mod params;
pub mod parasitics;
pub mod size;
// Fixtures for tests and benches.
#[doc(hidden)]
pub mod synthetic;
pub mod temp;
pub mod topology;
pub mod truncation;

pub use convergence::{ConvergenceReport, ConvergenceState, IterationState};
pub use instance::{Instance, SavedIteration};
pub use kernel::{Coefficient, StampSet};
pub use load::AdjointMirror;
pub use mode::{Mode, ModeView};
pub use model::{Model, ModelRef};
pub use noise::{NoiseEval, NoiseSource, NoiseState, NUM_NOISE_SOURCES};
pub use op::OperatingPoint;
pub use params::{Features, GateResistance, InstanceParams, ModelParams, MosType, SoiMode};
pub use parasitics::Parasitics;
pub use size::{GeometryFault, SizeCache, SizeDependParams};
pub use temp::ModelTemp;
pub use topology::{ExternalNodes, StampHandles, Terminal, Topology};
pub use truncation::{
    ChargeKind, StateHistory, StepLimit, TimestepReport, TruncationEstimator, TruncationSample,
};
