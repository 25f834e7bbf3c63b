//! Size-dependent parameters and their per-model cache.
//!
//! Every distinct drawn geometry `(L, W, NF, RTH0, CTH0)` gets one
//! [`SizeDependParams`] record, derived once and shared (through `Arc`) by all
//! instances with the same geometry. Records carry temperature-adjusted
//! values, so the cache is flushed whenever the model temperature changes.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use super::params::{BinPoint, ModelParams};
use super::temp::ModelTemp;

/// Why a geometry was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum GeometryFault {
    #[error("effective channel length is non-positive ({value:e} m)")]
    EffectiveLength { value: f64 },
    #[error("effective channel width is non-positive ({value:e} m)")]
    EffectiveWidth { value: f64 },
    #[error("effective CV channel length is non-positive ({value:e} m)")]
    EffectiveCvLength { value: f64 },
    #[error("effective CV channel width is non-positive ({value:e} m)")]
    EffectiveCvWidth { value: f64 },
    #[error("finger count must be at least 1 (got {value})")]
    FingerCount { value: f64 },
}

/// Drawn geometry plus the thermal parameters that enter the cache key.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geometry {
    pub l: f64,
    pub w: f64,
    pub nf: f64,
    pub rth0: f64,
    pub cth0: f64,
}

impl Geometry {
    /// Exact-bits cache key.
    pub fn key(&self) -> SizeKey {
        SizeKey([
            self.l.to_bits(),
            self.w.to_bits(),
            self.nf.to_bits(),
            self.rth0.to_bits(),
            self.cth0.to_bits(),
        ])
    }
}

/// Cache key: bit patterns of the geometry values, so lookups are exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SizeKey([u64; 5]);

/// Geometry- and temperature-resolved model parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SizeDependParams {
    /// Effective channel length (m).
    pub leff: f64,
    /// Effective channel width per finger (m).
    pub weff: f64,
    /// Effective length for capacitance (m).
    pub leff_cv: f64,
    /// Effective width for capacitance, per finger (m).
    pub weff_cv: f64,
    /// Drawn length after `xl` (m).
    pub lnew: f64,
    pub nf: f64,
    pub bin: BinPoint,

    // Binned, temperature adjusted
    pub vth0: f64,
    pub k1: f64,
    pub u0: f64,
    pub ua: f64,
    pub ub: f64,
    pub uc: f64,
    pub vsat: f64,
    pub rdsw: f64,
    pub alpha0: f64,
    pub beta0: f64,
    pub agidl: f64,
    pub bgidl: f64,
    pub aigc: f64,
    pub bigc: f64,
    pub nfactor: f64,
    pub eta0: f64,

    /// Oxide capacitance per area (F/m²).
    pub cox: f64,
    /// Characteristic length for flicker noise (m).
    pub litl: f64,
    /// Intrinsic source/drain resistance when no external nodes are used (ohm).
    pub rds_internal: f64,
    /// Thermal conductance to ambient (W/K); zero when RTH0 is zero.
    pub gth: f64,
    /// Thermal capacitance (J/K).
    pub cth: f64,
}

impl SizeDependParams {
    /// Derive the record for `geom` at the model temperature.
    pub fn derive(
        geom: &Geometry,
        model: &ModelParams,
        temp: &ModelTemp,
    ) -> Result<Self, GeometryFault> {
        if geom.nf.is_nan() || geom.nf < 1.0 {
            return Err(GeometryFault::FingerCount { value: geom.nf });
        }

        let lnew = geom.l + model.xl;
        let wnew = geom.w + model.xw;

        let tl = lnew.powf(model.lln);
        let tw = wnew.powf(model.lwn);
        let dl_geom = model.ll / tl + model.lw / tw + model.lwl / (tl * tw);
        let dl = model.lint + dl_geom;

        let tl = lnew.powf(model.wln);
        let tw = wnew.powf(model.wwn);
        let dw_geom = model.wl / tl + model.ww / tw + model.wwl / (tl * tw);
        let dw = model.wint + dw_geom;

        let leff = lnew - 2.0 * dl;
        if leff.is_nan() || leff <= 0.0 {
            return Err(GeometryFault::EffectiveLength { value: leff });
        }
        let weff = wnew - 2.0 * dw;
        if weff.is_nan() || weff <= 0.0 {
            return Err(GeometryFault::EffectiveWidth { value: weff });
        }
        let leff_cv = lnew - 2.0 * (model.dlc.unwrap_or(model.lint) + dl_geom);
        if leff_cv.is_nan() || leff_cv <= 0.0 {
            return Err(GeometryFault::EffectiveCvLength { value: leff_cv });
        }
        let weff_cv = wnew - 2.0 * (model.dwc.unwrap_or(model.wint) + dw_geom);
        if weff_cv.is_nan() || weff_cv <= 0.0 {
            return Err(GeometryFault::EffectiveCvWidth { value: weff_cv });
        }

        let bin = BinPoint::new(leff, weff, model.bin_exponent);
        let t_ratio_m1 = temp.tratio - 1.0;

        let vth0 = model.vth0.at(&bin) + (model.kt1 + model.kt1l / leff) * t_ratio_m1;
        let u0 = model.u0.at(&bin) * temp.tratio.powf(model.ute);
        let ua = model.ua.at(&bin) + model.ua1 * t_ratio_m1;
        let ub = model.ub.at(&bin) + model.ub1 * t_ratio_m1;
        let uc = model.uc.at(&bin) + model.uc1 * t_ratio_m1;
        let vsat = model.vsat.at(&bin) - model.at * t_ratio_m1;
        let rdsw = model.rdsw.at(&bin) + model.prt * t_ratio_m1;

        let total_w = weff * geom.nf;
        let rds_internal = rdsw / (total_w * 1e6);

        let thermal_w = total_w + model.wth0;
        let rth = if thermal_w > 0.0 { geom.rth0 / thermal_w } else { 0.0 };
        let gth = if rth > 0.0 { 1.0 / rth } else { 0.0 };
        let cth = geom.cth0 * thermal_w.max(0.0);

        Ok(Self {
            leff,
            weff,
            leff_cv,
            weff_cv,
            lnew,
            nf: geom.nf,
            bin,
            vth0,
            k1: model.k1.at(&bin),
            u0,
            ua,
            ub,
            uc,
            vsat,
            rdsw,
            alpha0: model.alpha0.at(&bin),
            beta0: model.beta0.at(&bin),
            agidl: model.agidl.at(&bin),
            bgidl: model.bgidl.at(&bin),
            aigc: model.aigc.at(&bin),
            bigc: model.bigc.at(&bin),
            nfactor: model.nfactor.at(&bin),
            eta0: model.eta0.at(&bin),
            cox: model.cox(),
            litl: (3.0 * model.tsi * model.tox).sqrt(),
            rds_internal,
            gth,
            cth,
        })
    }
}

/// Per-model map from geometry to shared size-dependent record.
#[derive(Debug, Default)]
pub struct SizeCache {
    entries: HashMap<SizeKey, Arc<SizeDependParams>>,
}

impl SizeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up `geom`, deriving and inserting the record on a miss.
    pub fn resolve(
        &mut self,
        geom: &Geometry,
        model: &ModelParams,
        temp: &ModelTemp,
    ) -> Result<Arc<SizeDependParams>, GeometryFault> {
        let key = geom.key();
        if let Some(hit) = self.entries.get(&key) {
            return Ok(Arc::clone(hit));
        }
        log::debug!(
            "size cache miss: L={:e} W={:e} NF={} at {:.2} K",
            geom.l,
            geom.w,
            geom.nf,
            temp.temp
        );
        let record = Arc::new(SizeDependParams::derive(geom, model, temp)?);
        self.entries.insert(key, Arc::clone(&record));
        Ok(record)
    }

    /// Drop every record (temperature or model-card change).
    pub fn flush(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
