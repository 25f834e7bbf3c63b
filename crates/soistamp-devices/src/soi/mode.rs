//! Mode Resolver: map role-coordinate operating-point data onto physical
//! drain/source terminals.
//!
//! The resolver is the only place that knows about operating mode. The stamp
//! kernel consumes a [`ModeView`] and never branches on forward/reverse.

use super::op::{BodyBranch, ChargeMatrix, GateNetwork, OperatingPoint, PowerDerivs, SideBranch, ThermalCaps};

/// Which physical terminal is acting as drain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Physical drain is the role drain (`vds >= 0`).
    #[default]
    Forward,
    /// Physical source is the role drain.
    Reverse,
}

impl Mode {
    /// Mode implied by the physical drain-source voltage.
    pub fn from_vds(vds: f64) -> Self {
        if vds >= 0.0 {
            Mode::Forward
        } else {
            Mode::Reverse
        }
    }

    /// +1 forward, -1 reverse.
    #[inline]
    pub fn sign(self) -> f64 {
        match self {
            Mode::Forward => 1.0,
            Mode::Reverse => -1.0,
        }
    }
}

/// Operating-point data in physical coordinates.
///
/// The channel current flows from drain prime to source prime with value
/// `ids`. Its partials with respect to (Dp, Gi, Sp, B, E, T) are
/// `(gds + rev_sum, gm, -(gds + fwd_sum), gmbs, gme, gmt)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModeView {
    pub mode: Mode,

    pub ids: f64,
    pub gm: f64,
    pub gds: f64,
    pub gmbs: f64,
    pub gme: f64,
    pub gmt: f64,
    pub fwd_sum: f64,
    pub rev_sum: f64,

    /// Impact ionization at the physical drain.
    pub impact_d: SideBranch,
    /// Impact ionization at the physical source.
    pub impact_s: SideBranch,
    pub gidl: SideBranch,
    pub gisl: SideBranch,
    pub igd: SideBranch,
    pub igs: SideBranch,
    pub igcd: SideBranch,
    pub igcs: SideBranch,
    pub igb: BodyBranch,

    pub gate_network: GateNetwork,
    pub caps: ChargeMatrix,
    pub thermal_caps: ThermalCaps,
    pub power: PowerDerivs,
}

impl ModeView {
    /// View of `op` under `mode`.
    pub fn resolve(op: &OperatingPoint, mode: Mode) -> Self {
        let forward = Self::forward(op);
        match mode {
            Mode::Forward => forward,
            Mode::Reverse => forward.reflected(),
        }
    }

    fn forward(op: &OperatingPoint) -> Self {
        Self {
            mode: Mode::Forward,
            ids: op.ids,
            gm: op.gm,
            gds: op.gds,
            gmbs: op.gmbs,
            gme: op.gme,
            gmt: op.gmt,
            fwd_sum: op.gm + op.gmbs + op.gme,
            rev_sum: 0.0,
            impact_d: op.impact,
            impact_s: SideBranch::default(),
            gidl: op.gidl,
            gisl: op.gisl,
            igd: op.igd,
            igs: op.igs,
            igcd: op.igcd,
            igcs: op.igcs,
            igb: op.igb,
            gate_network: op.gate_network,
            caps: op.caps,
            thermal_caps: op.thermal_caps,
            power: op.power,
        }
    }

    /// Exchange the roles of drain and source. Applying it twice is the identity.
    pub fn reflected(&self) -> Self {
        Self {
            mode: match self.mode {
                Mode::Forward => Mode::Reverse,
                Mode::Reverse => Mode::Forward,
            },
            ids: -self.ids,
            gm: -self.gm,
            gds: self.gds,
            gmbs: -self.gmbs,
            gme: -self.gme,
            gmt: -self.gmt,
            fwd_sum: self.rev_sum,
            rev_sum: self.fwd_sum,
            impact_d: self.impact_s,
            impact_s: self.impact_d,
            gidl: self.gisl,
            gisl: self.gidl,
            igd: self.igs,
            igs: self.igd,
            igcd: self.igcs,
            igcs: self.igcd,
            igb: self.igb.reflected(),
            gate_network: self.gate_network.reflected(),
            caps: self.caps.reflected(),
            thermal_caps: self.thermal_caps.reflected(),
            power: self.power.reflected(),
        }
    }

    /// Channel partials `(Dp, Gi, Sp, B, E, T)`.
    #[inline]
    pub fn channel_partials(&self) -> [f64; 6] {
        [
            self.gds + self.rev_sum,
            self.gm,
            -(self.gds + self.fwd_sum),
            self.gmbs,
            self.gme,
            self.gmt,
        ]
    }
}
