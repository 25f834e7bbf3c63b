//! Noise sources, spectral densities and log-log frequency integration.
//!
//! Each source is a current noise generator between two terminals. Its output
//! density is `|H|²·S` where `H` is the caller-supplied transfer for a unit
//! current between the terminal nodes and `S` the source's power spectral
//! density. Sources whose sub-network is disabled report zero.

use super::mode::ModeView;
use super::op::OperatingPoint;
use super::params::{Features, FlickerNoiseModel, GateResistance, ModelParams, ThermalNoiseModel, KB, Q};
use super::parasitics::Parasitics;
use super::size::SizeDependParams;
use super::topology::{Terminal, Topology};
use crate::analysis::{NoiseData, NoiseMode, NoiseTransfer};

/// Floor applied before taking logarithms of densities.
pub const N_MINLOG: f64 = 1e-38;

/// Number of per-instance noise sources. Index `NUM_NOISE_SOURCES` is the total.
pub const NUM_NOISE_SOURCES: usize = 13;

/// Noise generator of one instance, in stable index order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoiseSource {
    DrainResistance,
    SourceResistance,
    GateResistance,
    BodySourceResistance,
    BodyDrainResistance,
    BodyContactResistance,
    ChannelThermal,
    Flicker,
    GateSourceShot,
    GateDrainShot,
    GateBodyShot,
    BodySourceShot,
    BodyDrainShot,
}

impl NoiseSource {
    pub const ALL: [NoiseSource; NUM_NOISE_SOURCES] = [
        NoiseSource::DrainResistance,
        NoiseSource::SourceResistance,
        NoiseSource::GateResistance,
        NoiseSource::BodySourceResistance,
        NoiseSource::BodyDrainResistance,
        NoiseSource::BodyContactResistance,
        NoiseSource::ChannelThermal,
        NoiseSource::Flicker,
        NoiseSource::GateSourceShot,
        NoiseSource::GateDrainShot,
        NoiseSource::GateBodyShot,
        NoiseSource::BodySourceShot,
        NoiseSource::BodyDrainShot,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Short name used in noise summaries.
    pub fn name(self) -> &'static str {
        match self {
            NoiseSource::DrainResistance => "rd",
            NoiseSource::SourceResistance => "rs",
            NoiseSource::GateResistance => "rg",
            NoiseSource::BodySourceResistance => "rbs",
            NoiseSource::BodyDrainResistance => "rbd",
            NoiseSource::BodyContactResistance => "rbody",
            NoiseSource::ChannelThermal => "id",
            NoiseSource::Flicker => "1overf",
            NoiseSource::GateSourceShot => "igs",
            NoiseSource::GateDrainShot => "igd",
            NoiseSource::GateBodyShot => "igb",
            NoiseSource::BodySourceShot => "fb_ibs",
            NoiseSource::BodyDrainShot => "fb_ibd",
        }
    }
}

/// Name of the summary slot after the last source.
pub const TOTAL_NAME: &str = "total";

/// Output-referred densities of one instance at one frequency (V²/Hz).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NoiseEval {
    pub density: [f64; NUM_NOISE_SOURCES],
    pub total: f64,
}

impl NoiseEval {
    #[inline]
    pub fn density(&self, source: NoiseSource) -> f64 {
        self.density[source.index()]
    }
}

/// Everything a density evaluation reads.
#[derive(Debug, Clone, Copy)]
pub struct NoiseInput<'a> {
    pub model: &'a ModelParams,
    /// Ambient temperature (K); the self-heating rise is added from the bias.
    pub temp: f64,
    pub size: &'a SizeDependParams,
    pub parasitics: &'a Parasitics,
    pub features: &'a Features,
    pub topology: &'a Topology,
    pub op: &'a OperatingPoint,
    pub view: &'a ModeView,
}

impl NoiseInput<'_> {
    fn device_temp(&self) -> f64 {
        if self.features.selfheat {
            self.temp + self.op.bias.delta_t
        } else {
            self.temp
        }
    }

    /// Terminal pair and power spectral density (A²/Hz) of `source` at `freq`.
    pub fn source(&self, source: NoiseSource, freq: f64) -> (Terminal, Terminal, f64) {
        let f = self.features;
        let p = self.parasitics;
        let kt4 = 4.0 * KB * self.device_temp();
        let shot = |i: f64| 2.0 * Q * i.abs();
        match source {
            NoiseSource::DrainResistance => (Terminal::D, Terminal::Dp, gated(f.rds, kt4 * p.gdpr)),
            NoiseSource::SourceResistance => (Terminal::S, Terminal::Sp, gated(f.rds, kt4 * p.gspr)),
            NoiseSource::GateResistance => match f.rgate {
                GateResistance::None => (Terminal::G, Terminal::Gi, 0.0),
                GateResistance::Lumped => (Terminal::G, Terminal::Gi, kt4 * p.grgeltd),
                GateResistance::Distributed => (Terminal::G, Terminal::Gm, kt4 * p.grgeltd),
            },
            NoiseSource::BodySourceResistance => {
                (Terminal::Sb, Terminal::B, gated(f.rbody, kt4 * p.grbsb))
            }
            NoiseSource::BodyDrainResistance => {
                (Terminal::Db, Terminal::B, gated(f.rbody, kt4 * p.grbdb))
            }
            NoiseSource::BodyContactResistance => {
                (Terminal::P, Terminal::B, gated(f.body_contact, kt4 * p.gbp))
            }
            NoiseSource::ChannelThermal => (Terminal::Dp, Terminal::Sp, self.channel_thermal()),
            NoiseSource::Flicker => (Terminal::Dp, Terminal::Sp, self.flicker(freq)),
            NoiseSource::GateSourceShot => (
                Terminal::Gi,
                Terminal::Sp,
                gated(f.igc, shot(self.view.igs.current + self.view.igcs.current)),
            ),
            NoiseSource::GateDrainShot => (
                Terminal::Gi,
                Terminal::Dp,
                gated(f.igc, shot(self.view.igd.current + self.view.igcd.current)),
            ),
            NoiseSource::GateBodyShot => {
                (Terminal::Gi, Terminal::B, gated(f.igc, shot(self.view.igb.current)))
            }
            NoiseSource::BodySourceShot => {
                (Terminal::Sb, Terminal::Sp, gated(!f.ideal_fd(), shot(self.op.ibs)))
            }
            NoiseSource::BodyDrainShot => {
                (Terminal::Db, Terminal::Dp, gated(!f.ideal_fd(), shot(self.op.ibd)))
            }
        }
    }

    fn channel_thermal(&self) -> f64 {
        let op = self.op;
        let kt = KB * self.device_temp();
        let ntnoi = self.model.ntnoi;
        match self.model.tnoi_mod {
            ThermalNoiseModel::ChargeBased => {
                let nb = &op.noise;
                let rds = if self.features.rds { 0.0 } else { self.size.rds_internal };
                let t0 = nb.ueff * nb.qinv.abs();
                let t1 = t0 * rds + self.size.leff * self.size.leff;
                if t1 > 0.0 {
                    4.0 * kt * ntnoi * t0 / t1
                } else {
                    0.0
                }
            }
            ThermalNoiseModel::Holistic => {
                4.0 * kt * ntnoi * (op.gds + self.model.tnoia * (op.gm.abs() + op.gmbs.abs()))
            }
            ThermalNoiseModel::Spice2 => 8.0 * kt / 3.0 * (op.gm + op.gds + op.gmbs).abs(),
        }
    }

    fn flicker(&self, freq: f64) -> f64 {
        let m = self.model;
        let s = self.size;
        let ids = self.op.ids.abs();
        match m.fnoi_mod {
            FlickerNoiseModel::Simple => {
                m.kf * (m.af * ids.max(N_MINLOG).ln()).exp()
                    / (freq.powf(m.ef) * s.leff * s.leff * s.cox)
            }
            FlickerNoiseModel::Unified => {
                let temp = self.device_temp();
                let ssi = self.oxide_trap_density(freq, temp);
                let swi = m.noia * KB * temp * ids * ids
                    / (s.weff * s.nf * s.leff * freq.powf(m.ef) * 1.0e10 * self.op.noise.nstar.powi(2));
                let sum = ssi + swi;
                if sum > 0.0 {
                    ssi * swi / sum
                } else {
                    0.0
                }
            }
        }
    }

    /// Oxide-trap number/mobility fluctuation density.
    fn oxide_trap_density(&self, freq: f64, temp: f64) -> f64 {
        let m = self.model;
        let s = self.size;
        let nb = &self.op.noise;
        let cd = self.op.ids.abs();
        let vds = self.op.bias.vds.abs();

        let leff = s.leff - 2.0 * m.lintnoi;
        let leffsq = leff * leff;
        let esat = 2.0 * s.vsat / nb.ueff;
        let del_clm = if m.em <= 0.0 {
            0.0
        } else {
            let t0 = ((vds - nb.vdseff) / s.litl + m.em) / esat;
            (s.litl * t0.max(N_MINLOG).ln()).max(0.0)
        };
        let eff_freq = freq.powf(m.ef);
        let t1 = Q * Q * KB * cd * temp * nb.ueff;
        let t2 = 1.0e10 * eff_freq * nb.abulk * s.cox * leffsq;
        let n0 = s.cox * nb.vgsteff / Q;
        let nl = s.cox * nb.vgsteff * (1.0 - nb.abov_vgst2vtm * nb.vdseff) / Q;

        let t3 = m.noia * ((n0 + nb.nstar) / (nl + nb.nstar)).max(N_MINLOG).ln();
        let t4 = m.noib * (n0 - nl);
        let t5 = m.noic * 0.5 * (n0 * n0 - nl * nl);

        let t6 = KB * temp * cd * cd;
        let t7 = 1.0e10 * eff_freq * leffsq * s.weff * s.nf;
        let t8 = m.noia + m.noib * nl + m.noic * nl * nl;
        let t9 = (nl + nb.nstar) * (nl + nb.nstar);
        t1 / t2 * (t3 + t4 + t5) + t6 / t7 * del_clm * t8 / t9
    }

    /// Output-referred densities for every source.
    pub fn evaluate(&self, freq: f64, transfer: &dyn NoiseTransfer) -> NoiseEval {
        let mut eval = NoiseEval::default();
        for source in NoiseSource::ALL {
            let (pos, neg, psd) = self.source(source, freq);
            let density = if psd == 0.0 {
                0.0
            } else {
                let h = transfer.transfer(self.topology.node(pos), self.topology.node(neg));
                h.norm_sqr() * psd
            };
            eval.density[source.index()] = density;
            eval.total += density;
        }
        eval
    }
}

#[inline]
fn gated(enabled: bool, value: f64) -> f64 {
    if enabled {
        value
    } else {
        0.0
    }
}

/// Integral of a density over `[last_freq, freq]` assuming it is a power law
/// between the two points (straight line in log-log).
pub fn log_log_integral(density: f64, ln_density: f64, ln_last_density: f64, data: &NoiseData) -> f64 {
    let mut exponent = (ln_density - ln_last_density) / data.del_ln_freq();
    if exponent.abs() < 1e-10 {
        return density * data.del_freq();
    }
    let a = (ln_density - exponent * data.ln_freq).exp();
    exponent += 1.0;
    if exponent.abs() < 1e-10 {
        a * data.del_ln_freq()
    } else {
        a * ((exponent * data.ln_freq).exp() - (exponent * data.ln_last_freq).exp()) / exponent
    }
}

/// Per-instance integration state across a frequency sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct NoiseState {
    last_ln_density: [f64; NUM_NOISE_SOURCES],
    /// Integrated output noise per source, total last (V²).
    pub output: [f64; NUM_NOISE_SOURCES + 1],
    /// Integrated input-referred noise per source, total last.
    pub input: [f64; NUM_NOISE_SOURCES + 1],
    /// Densities from the most recent evaluation.
    pub latest: NoiseEval,
}

impl Default for NoiseState {
    fn default() -> Self {
        Self {
            last_ln_density: [N_MINLOG.ln(); NUM_NOISE_SOURCES],
            output: [0.0; NUM_NOISE_SOURCES + 1],
            input: [0.0; NUM_NOISE_SOURCES + 1],
            latest: NoiseEval::default(),
        }
    }
}

impl NoiseState {
    /// Forget everything (start of a new sweep).
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Record `eval` and, when integrating, add the interval since the
    /// previous point.
    pub fn record(&mut self, eval: NoiseEval, mode: NoiseMode, data: &NoiseData) {
        let integrate = mode == NoiseMode::Integrate && !data.is_first();
        for i in 0..NUM_NOISE_SOURCES {
            let density = eval.density[i];
            let ln_density = density.max(N_MINLOG).ln();
            if integrate {
                let out = log_log_integral(density, ln_density, self.last_ln_density[i], data);
                let inp = log_log_integral(
                    density * data.gain_sq_inv,
                    ln_density + data.ln_gain_inv,
                    self.last_ln_density[i] + data.ln_gain_inv,
                    data,
                );
                self.output[i] += out;
                self.input[i] += inp;
                self.output[NUM_NOISE_SOURCES] += out;
                self.input[NUM_NOISE_SOURCES] += inp;
            }
            self.last_ln_density[i] = ln_density;
        }
        self.latest = eval;
    }
}
