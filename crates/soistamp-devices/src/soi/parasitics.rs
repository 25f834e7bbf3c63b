//! Linear parasitic elements of one instance.

use super::params::{Features, GateResistance, InstanceParams, ModelParams};
use super::size::SizeDependParams;

/// Conductance used when a configured parasitic resistance evaluates to a
/// non-positive value (S).
pub const FALLBACK_CONDUCTANCE: f64 = 1.0e3;

/// Bias-independent conductances and capacitances.
///
/// Entries for disabled sub-networks are zero.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Parasitics {
    /// Drain resistance conductance D–Dp.
    pub gdpr: f64,
    /// Source resistance conductance S–Sp.
    pub gspr: f64,
    /// Gate electrode conductance G–Gi (lumped) or G–Gm (distributed).
    pub grgeltd: f64,
    pub grbdb: f64,
    pub grbsb: f64,
    /// Body-contact conductance P–B.
    pub gbp: f64,
    /// Thermal conductance to ambient.
    pub gth: f64,
    /// Thermal capacitance.
    pub cth: f64,
    pub cgdo: f64,
    pub cgso: f64,
    pub cgeo: f64,
    /// Drain diffusion to substrate through the buried oxide.
    pub cdbox: f64,
    pub csbox: f64,
}

impl Parasitics {
    pub fn new(
        name: &str,
        model: &ModelParams,
        inst: &InstanceParams,
        size: &SizeDependParams,
        features: &Features,
    ) -> Self {
        let mut p = Parasitics {
            cgdo: model.cgdo * size.weff_cv * size.nf,
            cgso: model.cgso * size.weff_cv * size.nf,
            cgeo: model.cgeo * size.leff_cv * size.nf,
            cdbox: model.cbox() * inst.ad,
            csbox: model.cbox() * inst.as_,
            ..Default::default()
        };

        if features.rds {
            let half = 0.5 * size.rds_internal;
            p.gdpr = conductance(name, "drain", model.rsh * inst.nrd + half);
            p.gspr = conductance(name, "source", model.rsh * inst.nrs + half);
        }

        if features.rgate != GateResistance::None {
            let rgeltd = model.rshg * (model.xgw + size.weff_cv / (3.0 * model.ngcon))
                / (model.ngcon * size.nf * (size.lnew - model.xgl));
            p.grgeltd = conductance(name, "gate", rgeltd);
        }

        if features.rbody {
            p.grbdb = 1.0 / model.rbdb;
            p.grbsb = 1.0 / model.rbsb;
        }

        if features.body_contact {
            let rbp = model.rbsh * size.weff / (size.leff * size.nf);
            p.gbp = conductance(name, "body contact", rbp);
        }

        if features.selfheat {
            p.gth = size.gth;
            p.cth = size.cth;
        }

        p
    }
}

fn conductance(name: &str, what: &str, resistance: f64) -> f64 {
    if resistance > 0.0 {
        1.0 / resistance
    } else {
        log::warn!(
            "{name}: {what} resistance {resistance:e} ohm is not positive, using {FALLBACK_CONDUCTANCE:e} S"
        );
        FALLBACK_CONDUCTANCE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::soi::size::Geometry;
    use crate::soi::temp::ModelTemp;

    fn size(model: &ModelParams, rth0: f64) -> SizeDependParams {
        let temp = ModelTemp::new(model.tnom, model.tnom);
        let geom = Geometry {
            l: 1e-6,
            w: 2e-6,
            nf: 2.0,
            rth0,
            cth0: 1e-5,
        };
        SizeDependParams::derive(&geom, model, &temp).unwrap()
    }

    #[test]
    fn test_disabled_networks_are_zero() {
        let model = ModelParams::nmos_default();
        let p = Parasitics::new(
            "M1",
            &model,
            &InstanceParams::default(),
            &size(&model, 0.0),
            &Features::minimal(),
        );
        assert_eq!(p.gdpr, 0.0);
        assert_eq!(p.grgeltd, 0.0);
        assert_eq!(p.grbdb, 0.0);
        assert_eq!(p.gth, 0.0);
        assert!(p.cgdo > 0.0);
    }

    #[test]
    fn test_gate_resistance_fallback() {
        let mut model = ModelParams::nmos_default();
        model.rshg = 0.0;
        let mut features = Features::minimal();
        features.rgate = GateResistance::Lumped;
        let p = Parasitics::new(
            "M1",
            &model,
            &InstanceParams::default(),
            &size(&model, 0.0),
            &features,
        );
        assert_eq!(p.grgeltd, FALLBACK_CONDUCTANCE);
    }

    #[test]
    fn test_gate_resistance_value() {
        let mut model = ModelParams::nmos_default();
        model.rshg = 10.0;
        let mut features = Features::minimal();
        features.rgate = GateResistance::Distributed;
        let s = size(&model, 0.0);
        let p = Parasitics::new("M1", &model, &InstanceParams::default(), &s, &features);
        let r = 10.0 * (s.weff_cv / 3.0) / (2.0 * s.lnew);
        approx::assert_relative_eq!(p.grgeltd, 1.0 / r, max_relative = 1e-12);
    }

    #[test]
    fn test_all_networks() {
        let mut model = ModelParams::nmos_default();
        model.rsh = 10.0;
        let s = size(&model, 0.01);
        let p = Parasitics::new("M1", &model, &InstanceParams::default(), &s, &Features::all());
        assert!(p.gdpr > 0.0 && p.gdpr.is_finite());
        assert_eq!(p.grbdb, 1.0 / model.rbdb);
        assert!(p.gbp > 0.0);
        assert_eq!(p.gth, s.gth);
        assert_eq!(p.cth, s.cth);
    }
}
