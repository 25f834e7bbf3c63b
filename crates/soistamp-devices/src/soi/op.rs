//! Operating point: the evaluator's output for one instance.
//!
//! Values are stored in *role* coordinates: "drain" means the terminal acting
//! as drain for the current operating mode, so in reverse mode the drain-side
//! fields describe the physical source. Junction currents, charges and charge
//! currents are the exception; they are always physical.
//!
//! Only the independent partial derivatives are stored. The dependent ones
//! follow from charge and current conservation and are derived on demand.

use super::topology::Terminal;

/// Terminal voltages relative to the source prime (physical orientation).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Bias {
    pub vgs: f64,
    pub vds: f64,
    pub vbs: f64,
    pub ves: f64,
    pub vps: f64,
    /// Gate mid-node to source prime.
    pub vgms: f64,
    /// Drain-side body to source prime.
    pub vdbs: f64,
    /// Source-side body to source prime.
    pub vsbs: f64,
    /// Device temperature rise over ambient (K).
    pub delta_t: f64,
}

impl Bias {
    /// Voltage of `t` relative to the source prime.
    ///
    /// External drain/gate/source report their intrinsic counterpart; they are
    /// only ever queried after aliasing has mapped them onto it.
    pub fn voltage(&self, t: Terminal) -> f64 {
        match t {
            Terminal::D | Terminal::Dp => self.vds,
            Terminal::G | Terminal::Gi => self.vgs,
            Terminal::S | Terminal::Sp => 0.0,
            Terminal::Gm => self.vgms,
            Terminal::B => self.vbs,
            Terminal::E => self.ves,
            Terminal::P => self.vps,
            Terminal::Db => self.vdbs,
            Terminal::Sb => self.vsbs,
            Terminal::T => self.delta_t,
        }
    }
}

/// A current between a drain/source-side terminal and another terminal,
/// described from the side it belongs to.
///
/// `dnear` is the partial with respect to the terminal on the same side,
/// the partial with respect to the opposite side is [`SideBranch::dfar`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SideBranch {
    pub current: f64,
    pub dg: f64,
    pub dnear: f64,
    pub db: f64,
    pub de: f64,
    pub dt: f64,
}

impl SideBranch {
    /// Partial with respect to the opposite-side terminal.
    #[inline]
    pub fn dfar(&self) -> f64 {
        -(self.dg + self.dnear + self.db + self.de)
    }
}

/// Gate-to-body tunneling current.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BodyBranch {
    pub current: f64,
    pub dg: f64,
    pub dd: f64,
    pub db: f64,
    pub de: f64,
    pub dt: f64,
}

impl BodyBranch {
    #[inline]
    pub fn ds(&self) -> f64 {
        -(self.dg + self.dd + self.db + self.de)
    }

    /// Exchange the drain and source partials.
    pub fn reflected(&self) -> Self {
        Self {
            dd: self.ds(),
            ..*self
        }
    }
}

/// Bias-dependent part of the distributed gate resistance.
///
/// Partials of the Gm→Gi current beyond the plain `gcrg` conductance.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GateNetwork {
    pub gcrg: f64,
    pub gcrgg: f64,
    pub gcrgd: f64,
    pub gcrgs: f64,
}

impl GateNetwork {
    #[inline]
    pub fn gcrgb(&self) -> f64 {
        -(self.gcrgg + self.gcrgd + self.gcrgs)
    }

    pub fn reflected(&self) -> Self {
        Self {
            gcrgd: self.gcrgs,
            gcrgs: self.gcrgd,
            ..*self
        }
    }
}

/// Intrinsic capacitance matrix (F), independent entries only.
///
/// Rows/columns follow `[gate, drain, source, body]`; the source row and the
/// body column are implied by charge conservation.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ChargeMatrix {
    pub cggb: f64,
    pub cgdb: f64,
    pub cgsb: f64,
    pub cdgb: f64,
    pub cddb: f64,
    pub cdsb: f64,
    pub cbgb: f64,
    pub cbdb: f64,
    pub cbsb: f64,
}

const G: usize = 0;
const D: usize = 1;
const S: usize = 2;
const B: usize = 3;

impl ChargeMatrix {
    /// Full 4×4 matrix with dependent entries filled in.
    pub fn full(&self) -> [[f64; 4]; 4] {
        let mut m = [[0.0; 4]; 4];
        m[G] = [self.cggb, self.cgdb, self.cgsb, 0.0];
        m[D] = [self.cdgb, self.cddb, self.cdsb, 0.0];
        m[B] = [self.cbgb, self.cbdb, self.cbsb, 0.0];
        for col in [G, D, S] {
            m[S][col] = -(m[G][col] + m[D][col] + m[B][col]);
        }
        for row in [G, D, S, B] {
            m[row][B] = -(m[row][G] + m[row][D] + m[row][S]);
        }
        m
    }

    fn from_full(m: &[[f64; 4]; 4]) -> Self {
        Self {
            cggb: m[G][G],
            cgdb: m[G][D],
            cgsb: m[G][S],
            cdgb: m[D][G],
            cddb: m[D][D],
            cdsb: m[D][S],
            cbgb: m[B][G],
            cbdb: m[B][D],
            cbsb: m[B][S],
        }
    }

    /// Swap the drain and source rows and columns.
    pub fn reflected(&self) -> Self {
        let m = self.full();
        let swap = |i: usize| match i {
            D => S,
            S => D,
            other => other,
        };
        let mut r = [[0.0; 4]; 4];
        for (i, row) in r.iter_mut().enumerate() {
            for (j, v) in row.iter_mut().enumerate() {
                *v = m[swap(i)][swap(j)];
            }
        }
        Self::from_full(&r)
    }
}

/// Charge sensitivities to the temperature rise (C/K).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ThermalCaps {
    pub cgt: f64,
    pub cdt: f64,
    pub cbt: f64,
}

impl ThermalCaps {
    #[inline]
    pub fn cst(&self) -> f64 {
        -(self.cgt + self.cdt + self.cbt)
    }

    pub fn reflected(&self) -> Self {
        Self {
            cdt: self.cst(),
            ..*self
        }
    }
}

/// Dissipated power and its partials (self-heating).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PowerDerivs {
    pub power: f64,
    pub gpg: f64,
    pub gpd: f64,
    pub gpb: f64,
    pub gpe: f64,
    pub gpt: f64,
}

impl PowerDerivs {
    #[inline]
    pub fn gps(&self) -> f64 {
        -(self.gpg + self.gpd + self.gpb + self.gpe)
    }

    pub fn reflected(&self) -> Self {
        Self {
            gpd: self.gps(),
            ..*self
        }
    }
}

/// Terminal charges (C) tracked for truncation-error control.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Charges {
    pub gate: f64,
    pub drain: f64,
    pub body: f64,
    /// Thermal "charge" `cth·ΔT` (J).
    pub thermal: f64,
}

/// Integrated charge currents (A) per terminal, as produced by the integrator.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ChargeCurrents {
    /// Intrinsic gate charge current.
    pub gate: f64,
    /// Overlap charge current; lands on the gate mid-node when the gate is distributed.
    pub gate_overlap: f64,
    pub drain: f64,
    pub source: f64,
    pub body: f64,
    pub substrate: f64,
    pub drain_body: f64,
    pub source_body: f64,
    pub thermal: f64,
}

/// Evaluator intermediates needed by the noise models.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NoiseBias {
    /// Effective mobility (m²/V·s).
    pub ueff: f64,
    /// Inversion charge (C).
    pub qinv: f64,
    pub vgsteff: f64,
    pub vdseff: f64,
    pub abulk: f64,
    /// `Abulk / (Vgsteff + 2·Vtm)`.
    pub abov_vgst2vtm: f64,
    /// Subthreshold slope factor term.
    pub nstar: f64,
}

/// Everything the evaluator computes at one bias point.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OperatingPoint {
    pub bias: Bias,

    // Channel (role)
    pub ids: f64,
    pub gm: f64,
    pub gds: f64,
    pub gmbs: f64,
    pub gme: f64,
    pub gmt: f64,

    // Junctions (physical)
    pub ibs: f64,
    pub ibd: f64,
    pub gbs: f64,
    pub gbd: f64,
    pub gbst: f64,
    pub gbdt: f64,
    pub capbs: f64,
    pub capbd: f64,

    // Side branches (role)
    /// Impact ionization, drain into body.
    pub impact: SideBranch,
    /// Gate-induced drain leakage, drain into body.
    pub gidl: SideBranch,
    /// Gate-induced source leakage, source into body.
    pub gisl: SideBranch,
    /// Gate-to-drain overlap tunneling.
    pub igd: SideBranch,
    /// Gate-to-source overlap tunneling.
    pub igs: SideBranch,
    /// Gate-to-channel tunneling, drain partition.
    pub igcd: SideBranch,
    /// Gate-to-channel tunneling, source partition.
    pub igcs: SideBranch,
    pub igb: BodyBranch,

    pub gate_network: GateNetwork,
    pub caps: ChargeMatrix,
    pub thermal_caps: ThermalCaps,
    pub power: PowerDerivs,

    pub charges: Charges,
    pub charge_currents: ChargeCurrents,
    pub noise: NoiseBias,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_caps() -> ChargeMatrix {
        ChargeMatrix {
            cggb: 3.0,
            cgdb: -1.0,
            cgsb: -1.5,
            cdgb: -0.8,
            cddb: 1.2,
            cdsb: -0.1,
            cbgb: -0.7,
            cbdb: -0.05,
            cbsb: -0.2,
        }
    }

    #[test]
    fn test_full_matrix_conserves_charge() {
        let m = sample_caps().full();
        for i in 0..4 {
            let row: f64 = m[i].iter().sum();
            let col: f64 = (0..4).map(|r| m[r][i]).sum();
            assert!(row.abs() < 1e-12, "row {i} sums to {row}");
            assert!(col.abs() < 1e-12, "col {i} sums to {col}");
        }
    }

    #[test]
    fn test_reflection_is_involution() {
        let caps = sample_caps();
        let back = caps.reflected().reflected();
        approx::assert_relative_eq!(back.cdgb, caps.cdgb, epsilon = 1e-12);
        approx::assert_relative_eq!(back.cbsb, caps.cbsb, epsilon = 1e-12);
        approx::assert_relative_eq!(back.cgdb, caps.cgdb, epsilon = 1e-12);
    }

    #[test]
    fn test_reflected_drain_row_is_source_row() {
        let caps = sample_caps();
        let r = caps.reflected();
        // new drain-gate = old source-gate = -(cggb + cdgb + cbgb)
        approx::assert_relative_eq!(r.cdgb, -(3.0 - 0.8 - 0.7), epsilon = 1e-12);
        assert_eq!(r.cggb, caps.cggb);
        assert_eq!(r.cgdb, caps.cgsb);
        assert_eq!(r.cgsb, caps.cgdb);
    }

    #[test]
    fn test_derived_partials() {
        let side = SideBranch {
            current: 1e-6,
            dg: 1.0,
            dnear: 2.0,
            db: 3.0,
            de: 4.0,
            dt: 0.5,
        };
        assert_eq!(side.dfar(), -10.0);

        let igb = BodyBranch {
            dg: 1.0,
            dd: 0.25,
            db: -0.5,
            de: 0.0,
            ..Default::default()
        };
        assert_eq!(igb.reflected().dd, igb.ds());
        assert_eq!(igb.reflected().reflected(), igb);
    }

    #[test]
    fn test_bias_voltage_lookup() {
        let bias = Bias {
            vgs: 1.0,
            vds: 0.5,
            vbs: -0.2,
            vgms: 0.9,
            delta_t: 3.0,
            ..Default::default()
        };
        assert_eq!(bias.voltage(Terminal::Dp), 0.5);
        assert_eq!(bias.voltage(Terminal::Sp), 0.0);
        assert_eq!(bias.voltage(Terminal::Gm), 0.9);
        assert_eq!(bias.voltage(Terminal::T), 3.0);
    }
}
