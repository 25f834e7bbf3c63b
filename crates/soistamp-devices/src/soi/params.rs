//! SOI MOSFET model and instance parameters.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Elementary charge (C).
pub const Q: f64 = 1.602176634e-19;
/// Boltzmann constant (J/K).
pub const KB: f64 = 1.380649e-23;
/// Permittivity of SiO2 (F/m).
pub const EPS_OX: f64 = 3.45314e-11;
/// Nominal temperature (K).
pub const T_NOM: f64 = 300.15;

/// Channel polarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MosType {
    #[default]
    Nmos,
    Pmos,
}

impl MosType {
    /// +1 for NMOS, -1 for PMOS.
    pub fn sign(self) -> f64 {
        match self {
            MosType::Nmos => 1.0,
            MosType::Pmos => -1.0,
        }
    }
}

/// Gate electrode resistance network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[non_exhaustive]
pub enum GateResistance {
    /// No gate resistance; Gi aliases G.
    #[default]
    None,
    /// Single resistor G–Gi.
    Lumped,
    /// Resistor G–Gm plus a bias-dependent Gm–Gi channel-reflected branch.
    Distributed,
}

/// Body depletion treatment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[non_exhaustive]
pub enum SoiMode {
    /// Floating body with full body node.
    #[default]
    PartiallyDepleted,
    /// Same stamp topology as partially depleted; the evaluator decides depletion.
    Unified,
    /// Body tied to the source prime; impact ionization and GIDL are not stamped.
    IdealFullyDepleted,
}

/// Channel thermal noise formulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ThermalNoiseModel {
    /// Inversion-charge based (`4kT·µ|Qinv| / (L² + µ|Qinv|·Rds)`).
    #[default]
    ChargeBased,
    /// Holistic approximation built from the small-signal conductances.
    Holistic,
    /// Classic `8kT/3·(gm + gds + gmbs)`.
    Spice2,
}

/// Flicker noise formulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[non_exhaustive]
pub enum FlickerNoiseModel {
    /// `KF·|I|^AF / (f^EF·Cox·Leff²)`.
    #[default]
    Simple,
    /// Oxide-trap density model (NOIA/NOIB/NOIC).
    Unified,
}

/// A length/width binned parameter: `base + l/Lⁿ + w/Wⁿ + p/(L·W)ⁿ`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Binned {
    pub base: f64,
    pub l: f64,
    pub w: f64,
    pub p: f64,
}

impl Binned {
    /// A parameter with no length/width dependence.
    pub const fn flat(base: f64) -> Self {
        Self {
            base,
            l: 0.0,
            w: 0.0,
            p: 0.0,
        }
    }

    /// Value at the given binning point.
    #[inline]
    pub fn at(&self, bin: &BinPoint) -> f64 {
        self.base + self.l * bin.inv_l + self.w * bin.inv_w + self.p * bin.inv_lw
    }
}

/// Inverse-geometry factors used by [`Binned::at`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinPoint {
    pub inv_l: f64,
    pub inv_w: f64,
    pub inv_lw: f64,
}

impl BinPoint {
    /// Binning factors in micron units for effective length/width (m).
    pub fn new(leff: f64, weff: f64, exponent: f64) -> Self {
        let inv_l = (1e-6 / leff).powf(exponent);
        let inv_w = (1e-6 / weff).powf(exponent);
        Self {
            inv_l,
            inv_w,
            inv_lw: inv_l * inv_w,
        }
    }
}

/// Model card shared by every instance of one SOI MOSFET model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelParams {
    pub mos_type: MosType,
    /// Parameter measurement temperature (K).
    pub tnom: f64,

    // Capability flags
    pub rds_mod: bool,
    pub rgate_mod: GateResistance,
    pub rbody_mod: bool,
    pub igc_mod: bool,
    pub soi_mod: SoiMode,
    pub sh_mod: bool,
    pub tnoi_mod: ThermalNoiseModel,
    pub fnoi_mod: FlickerNoiseModel,

    // Process
    pub tox: f64,
    pub tsi: f64,
    pub tbox: f64,

    // Geometry offsets
    pub xl: f64,
    pub xw: f64,
    pub lint: f64,
    pub ll: f64,
    pub lw: f64,
    pub lwl: f64,
    pub lln: f64,
    pub lwn: f64,
    pub wint: f64,
    pub wl: f64,
    pub ww: f64,
    pub wwl: f64,
    pub wln: f64,
    pub wwn: f64,
    /// CV length offset; `None` falls back to `lint`.
    pub dlc: Option<f64>,
    /// CV width offset; `None` falls back to `wint`.
    pub dwc: Option<f64>,
    /// Exponent applied to the binning inverse-geometry terms.
    pub bin_exponent: f64,

    // Binned
    pub vth0: Binned,
    pub k1: Binned,
    pub u0: Binned,
    pub ua: Binned,
    pub ub: Binned,
    pub uc: Binned,
    pub vsat: Binned,
    pub rdsw: Binned,
    pub alpha0: Binned,
    pub beta0: Binned,
    pub agidl: Binned,
    pub bgidl: Binned,
    pub aigc: Binned,
    pub bigc: Binned,
    pub nfactor: Binned,
    pub eta0: Binned,

    // Temperature
    pub kt1: f64,
    pub kt1l: f64,
    pub ute: f64,
    pub at: f64,
    pub ua1: f64,
    pub ub1: f64,
    pub uc1: f64,
    pub prt: f64,

    // Parasitic resistances
    pub rsh: f64,
    pub rshg: f64,
    pub xgw: f64,
    pub xgl: f64,
    pub ngcon: f64,
    pub rbdb: f64,
    pub rbsb: f64,
    /// Body sheet resistance seen from the body contact (ohm/sq).
    pub rbsh: f64,

    // Overlap and box capacitances
    pub cgso: f64,
    pub cgdo: f64,
    pub cgeo: f64,

    // Self-heating
    pub rth0: f64,
    pub cth0: f64,
    pub wth0: f64,

    // Noise
    pub kf: f64,
    pub af: f64,
    pub ef: f64,
    pub noia: f64,
    pub noib: f64,
    pub noic: f64,
    pub em: f64,
    pub tnoia: f64,
    pub ntnoi: f64,
    pub lintnoi: f64,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self::nmos_default()
    }
}

impl ModelParams {
    /// Representative 0.13 µm partially-depleted NMOS card.
    pub fn nmos_default() -> Self {
        Self {
            mos_type: MosType::Nmos,
            tnom: T_NOM,

            rds_mod: false,
            rgate_mod: GateResistance::None,
            rbody_mod: false,
            igc_mod: false,
            soi_mod: SoiMode::PartiallyDepleted,
            sh_mod: false,
            tnoi_mod: ThermalNoiseModel::ChargeBased,
            fnoi_mod: FlickerNoiseModel::Simple,

            tox: 2.5e-9,
            tsi: 1e-7,
            tbox: 3e-7,

            xl: 0.0,
            xw: 0.0,
            lint: 1e-8,
            ll: 0.0,
            lw: 0.0,
            lwl: 0.0,
            lln: 1.0,
            lwn: 1.0,
            wint: 1e-8,
            wl: 0.0,
            ww: 0.0,
            wwl: 0.0,
            wln: 1.0,
            wwn: 1.0,
            dlc: None,
            dwc: None,
            bin_exponent: 1.0,

            vth0: Binned::flat(0.35),
            k1: Binned::flat(0.6),
            u0: Binned::flat(0.035),
            ua: Binned::flat(2.25e-9),
            ub: Binned::flat(5.87e-19),
            uc: Binned::flat(-4.65e-11),
            vsat: Binned::flat(8e4),
            rdsw: Binned::flat(150.0),
            alpha0: Binned::flat(0.0),
            beta0: Binned::flat(30.0),
            agidl: Binned::flat(0.0),
            bgidl: Binned::flat(2.3e9),
            aigc: Binned::flat(0.43),
            bigc: Binned::flat(0.054),
            nfactor: Binned::flat(1.0),
            eta0: Binned::flat(0.08),

            kt1: -0.11,
            kt1l: 0.0,
            ute: -1.5,
            at: 3.3e4,
            ua1: 4.31e-9,
            ub1: -7.61e-18,
            uc1: -5.6e-11,
            prt: 0.0,

            rsh: 0.0,
            rshg: 0.1,
            xgw: 0.0,
            xgl: 0.0,
            ngcon: 1.0,
            rbdb: 50.0,
            rbsb: 50.0,
            rbsh: 1e3,

            cgso: 2e-10,
            cgdo: 2e-10,
            cgeo: 0.0,

            rth0: 0.0,
            cth0: 1e-5,
            wth0: 0.0,

            kf: 0.0,
            af: 1.0,
            ef: 1.0,
            noia: 6.25e41,
            noib: 3.125e26,
            noic: 8.75e9,
            em: 4.1e7,
            tnoia: 1.5,
            ntnoi: 1.0,
            lintnoi: 0.0,
        }
    }

    /// PMOS counterpart of [`ModelParams::nmos_default`].
    pub fn pmos_default() -> Self {
        Self {
            mos_type: MosType::Pmos,
            vth0: Binned::flat(-0.35),
            u0: Binned::flat(0.01),
            ..Self::nmos_default()
        }
    }

    /// Oxide capacitance per unit area (F/m²).
    #[inline]
    pub fn cox(&self) -> f64 {
        EPS_OX / self.tox
    }

    /// Buried-oxide capacitance per unit area (F/m²).
    #[inline]
    pub fn cbox(&self) -> f64 {
        EPS_OX / self.tbox
    }

    /// Reject model cards whose values make every instance meaningless.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("tnom", self.tnom),
            ("tox", self.tox),
            ("tsi", self.tsi),
            ("tbox", self.tbox),
            ("ngcon", self.ngcon),
        ];
        for (name, value) in positive {
            if value.is_nan() || value <= 0.0 {
                return Err(Error::InvalidParameter { name, value });
            }
        }
        if self.rbody_mod {
            self.validate_body_network()?;
        }
        Ok(())
    }

    /// Body resistances must be positive wherever the network is enabled,
    /// whether by the card or by an instance override.
    pub fn validate_body_network(&self) -> Result<()> {
        for (name, value) in [("rbdb", self.rbdb), ("rbsb", self.rbsb)] {
            if value.is_nan() || value <= 0.0 {
                return Err(Error::InvalidParameter { name, value });
            }
        }
        Ok(())
    }
}

/// Per-instance geometry and overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstanceParams {
    /// Drawn length (m).
    pub l: f64,
    /// Drawn width per finger (m).
    pub w: f64,
    /// Number of fingers.
    pub nf: f64,
    pub ad: f64,
    #[serde(rename = "as")]
    pub as_: f64,
    pub pd: f64,
    pub ps: f64,
    /// Drain diffusion squares.
    pub nrd: f64,
    /// Source diffusion squares.
    pub nrs: f64,
    /// Thermal resistance override; `None` uses the model value.
    pub rth0: Option<f64>,
    /// Thermal capacitance override; `None` uses the model value.
    pub cth0: Option<f64>,
    pub rgate_mod: Option<GateResistance>,
    pub rbody_mod: Option<bool>,
}

impl Default for InstanceParams {
    fn default() -> Self {
        Self {
            l: 1.3e-7,
            w: 1e-6,
            nf: 1.0,
            ad: 0.0,
            as_: 0.0,
            pd: 0.0,
            ps: 0.0,
            nrd: 1.0,
            nrs: 1.0,
            rth0: None,
            cth0: None,
            rgate_mod: None,
            rbody_mod: None,
        }
    }
}

impl InstanceParams {
    /// Instance with the given drawn geometry and default everything else.
    pub fn with_size(l: f64, w: f64) -> Self {
        Self {
            l,
            w,
            ..Self::default()
        }
    }
}

/// Which optional sub-networks an instance carries, resolved once from the
/// model flags, instance overrides and terminal list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Features {
    pub rds: bool,
    pub rgate: GateResistance,
    pub rbody: bool,
    pub igc: bool,
    pub soi: SoiMode,
    pub selfheat: bool,
    pub body_contact: bool,
}

impl Features {
    /// Combine model flags with instance overrides.
    ///
    /// Self-heating needs both the model switch and a positive thermal
    /// resistance. A body contact is ignored in ideal fully-depleted mode,
    /// where there is no independent body node to attach it to.
    pub fn resolve(model: &ModelParams, inst: &InstanceParams, has_body_contact: bool) -> Self {
        let soi = model.soi_mod;
        let ideal_fd = soi == SoiMode::IdealFullyDepleted;
        let rth0 = inst.rth0.unwrap_or(model.rth0);
        Self {
            rds: model.rds_mod,
            rgate: inst.rgate_mod.unwrap_or(model.rgate_mod),
            rbody: inst.rbody_mod.unwrap_or(model.rbody_mod) && !ideal_fd,
            igc: model.igc_mod,
            soi,
            selfheat: model.sh_mod && rth0 > 0.0,
            body_contact: has_body_contact && !ideal_fd,
        }
    }

    /// Body tied to the source prime.
    #[inline]
    pub fn ideal_fd(&self) -> bool {
        self.soi == SoiMode::IdealFullyDepleted
    }

    /// Everything switched on; used by tests and benchmarks.
    pub fn all() -> Self {
        Self {
            rds: true,
            rgate: GateResistance::Distributed,
            rbody: true,
            igc: true,
            soi: SoiMode::PartiallyDepleted,
            selfheat: true,
            body_contact: true,
        }
    }

    /// Everything switched off.
    pub fn minimal() -> Self {
        Self {
            rds: false,
            rgate: GateResistance::None,
            rbody: false,
            igc: false,
            soi: SoiMode::PartiallyDepleted,
            selfheat: false,
            body_contact: false,
        }
    }
}
