//! Deterministic synthetic operating points.
//!
//! Values are drawn from a SplitMix64 stream, so a seed always produces the
//! same point. Magnitudes are in realistic ranges but carry no physics; the
//! structural properties of the stamps must hold for any of them.

use super::op::{
    Bias, BodyBranch, ChargeCurrents, ChargeMatrix, Charges, GateNetwork, NoiseBias, OperatingPoint,
    PowerDerivs, SideBranch, ThermalCaps,
};
use super::parasitics::Parasitics;

/// SplitMix64 mixing step.
#[inline]
pub fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9e3779b97f4a7c15);
    x = (x ^ (x >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94d049bb133111eb);
    x ^ (x >> 31)
}

struct Stream(u64);

impl Stream {
    fn new(seed: u64) -> Self {
        Stream(splitmix64(seed))
    }

    /// Uniform in [0, 1).
    fn unit(&mut self) -> f64 {
        self.0 = splitmix64(self.0);
        (self.0 >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Uniform in (-scale, scale).
    fn signed(&mut self, scale: f64) -> f64 {
        (2.0 * self.unit() - 1.0) * scale
    }

    /// Uniform in [0, scale).
    fn positive(&mut self, scale: f64) -> f64 {
        self.unit() * scale
    }

    fn side(&mut self, i: f64, g: f64) -> SideBranch {
        SideBranch {
            current: self.signed(i),
            dg: self.signed(g),
            dnear: self.signed(g),
            db: self.signed(g),
            de: self.signed(g),
            dt: self.signed(g * 1e-2),
        }
    }
}

/// A fully populated operating point.
pub fn operating_point(seed: u64) -> OperatingPoint {
    let mut r = Stream::new(seed);
    let bias = Bias {
        vgs: r.signed(1.2),
        vds: r.signed(1.2),
        vbs: r.signed(0.6),
        ves: r.signed(1.0),
        vps: r.signed(0.6),
        vgms: r.signed(1.2),
        vdbs: r.signed(1.2),
        vsbs: r.signed(0.6),
        delta_t: r.positive(5.0),
    };
    let caps = ChargeMatrix {
        cggb: r.positive(2e-15),
        cgdb: r.signed(1e-15),
        cgsb: r.signed(1e-15),
        cdgb: r.signed(1e-15),
        cddb: r.signed(1e-15),
        cdsb: r.signed(1e-15),
        cbgb: r.signed(1e-15),
        cbdb: r.signed(1e-15),
        cbsb: r.signed(1e-15),
    };
    OperatingPoint {
        bias,
        ids: r.signed(1e-3),
        gm: r.positive(5e-3),
        gds: r.positive(5e-4),
        gmbs: r.signed(1e-3),
        gme: r.signed(1e-4),
        gmt: r.signed(1e-5),
        ibs: r.signed(1e-9),
        ibd: r.signed(1e-9),
        gbs: r.positive(1e-8),
        gbd: r.positive(1e-8),
        gbst: r.signed(1e-11),
        gbdt: r.signed(1e-11),
        capbs: r.positive(1e-16),
        capbd: r.positive(1e-16),
        impact: r.side(1e-7, 1e-6),
        gidl: r.side(1e-10, 1e-9),
        gisl: r.side(1e-10, 1e-9),
        igd: r.side(1e-10, 1e-9),
        igs: r.side(1e-10, 1e-9),
        igcd: r.side(1e-10, 1e-9),
        igcs: r.side(1e-10, 1e-9),
        igb: BodyBranch {
            current: r.signed(1e-11),
            dg: r.signed(1e-10),
            dd: r.signed(1e-10),
            db: r.signed(1e-10),
            de: r.signed(1e-10),
            dt: r.signed(1e-12),
        },
        gate_network: GateNetwork {
            gcrg: r.positive(1e-2),
            gcrgg: r.signed(1e-3),
            gcrgd: r.signed(1e-3),
            gcrgs: r.signed(1e-3),
        },
        caps,
        thermal_caps: ThermalCaps {
            cgt: r.signed(1e-18),
            cdt: r.signed(1e-18),
            cbt: r.signed(1e-18),
        },
        power: PowerDerivs {
            power: r.positive(1e-3),
            gpg: r.signed(1e-3),
            gpd: r.signed(1e-3),
            gpb: r.signed(1e-3),
            gpe: r.signed(1e-4),
            gpt: r.signed(1e-5),
        },
        charges: Charges {
            gate: r.signed(1e-15),
            drain: r.signed(1e-15),
            body: r.signed(1e-15),
            thermal: r.positive(1e-12),
        },
        charge_currents: ChargeCurrents {
            gate: r.signed(1e-6),
            gate_overlap: r.signed(1e-7),
            drain: r.signed(1e-6),
            source: r.signed(1e-6),
            body: r.signed(1e-7),
            substrate: r.signed(1e-8),
            drain_body: r.signed(1e-8),
            source_body: r.signed(1e-8),
            thermal: r.signed(1e-6),
        },
        noise: NoiseBias {
            ueff: 0.01 + r.positive(0.03),
            qinv: 1e-16 + r.positive(1e-14),
            vgsteff: 0.05 + r.positive(0.5),
            vdseff: 0.05 + r.positive(0.5),
            abulk: 1.0 + r.positive(0.2),
            abov_vgst2vtm: 0.01 + r.positive(0.1),
            nstar: 1.0 + r.positive(1.0),
        },
    }
}

/// Parasitics with every element populated.
pub fn parasitics(seed: u64) -> Parasitics {
    let mut r = Stream::new(seed ^ 0x5851f42d4c957f2d);
    Parasitics {
        gdpr: 1e-2 + r.positive(1e-1),
        gspr: 1e-2 + r.positive(1e-1),
        grgeltd: 1e-3 + r.positive(1e-2),
        grbdb: 1e-3 + r.positive(1e-2),
        grbsb: 1e-3 + r.positive(1e-2),
        gbp: 1e-4 + r.positive(1e-3),
        gth: 1e-4 + r.positive(1e-3),
        cth: r.positive(1e-9),
        cgdo: r.positive(1e-16),
        cgso: r.positive(1e-16),
        cgeo: r.positive(1e-17),
        cdbox: r.positive(1e-17),
        csbox: r.positive(1e-17),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_splitmix_reference_value() {
        // First output of SplitMix64 seeded with 0.
        assert_eq!(splitmix64(0), 0xe220a8397b1dcdaf);
    }

    #[test]
    fn test_deterministic() {
        assert_eq!(operating_point(3), operating_point(3));
        assert_ne!(operating_point(3), operating_point(4));
    }

    #[test]
    fn test_unit_range() {
        let mut s = Stream::new(1);
        for _ in 0..1000 {
            let u = s.unit();
            assert!((0.0..1.0).contains(&u));
        }
    }
}
