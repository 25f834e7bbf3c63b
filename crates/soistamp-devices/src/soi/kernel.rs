//! Stamp Kernel: turn a resolved operating point into analysis-agnostic
//! per-terminal coefficients.
//!
//! Every contribution is written through a handful of primitives (two-terminal
//! conductance and capacitor, controlled branch current, charge current) so
//! that each electrical row and column of the result sums to zero. The
//! temperature row is a power balance and is exempt.

use super::mode::ModeView;
use super::op::{Bias, OperatingPoint, SideBranch};
use super::parasitics::Parasitics;
use super::params::{Features, GateResistance};
use super::topology::{Terminal, Topology, NUM_TERMINALS};

/// Conductive and capacitive part of one matrix position.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Coefficient {
    /// Conductance (S).
    pub g: f64,
    /// Capacitance (F), multiplied by the analysis frequency variable later.
    pub xc: f64,
}

/// Coefficients for every terminal pair plus per-terminal RHS terms.
#[derive(Debug, Clone, PartialEq)]
pub struct StampSet {
    coeff: [[Coefficient; NUM_TERMINALS]; NUM_TERMINALS],
    touched: [[bool; NUM_TERMINALS]; NUM_TERMINALS],
    ieq: [f64; NUM_TERMINALS],
    charge_current: [f64; NUM_TERMINALS],
    charge_linear: [f64; NUM_TERMINALS],
}

impl Default for StampSet {
    fn default() -> Self {
        Self {
            coeff: [[Coefficient::default(); NUM_TERMINALS]; NUM_TERMINALS],
            touched: [[false; NUM_TERMINALS]; NUM_TERMINALS],
            ieq: [0.0; NUM_TERMINALS],
            charge_current: [0.0; NUM_TERMINALS],
            charge_linear: [0.0; NUM_TERMINALS],
        }
    }
}

impl StampSet {
    #[inline]
    pub fn get(&self, row: Terminal, col: Terminal) -> Coefficient {
        self.coeff[row.index()][col.index()]
    }

    /// Whether the kernel wrote `(row, col)`, regardless of the value.
    #[inline]
    pub fn is_touched(&self, row: Terminal, col: Terminal) -> bool {
        self.touched[row.index()][col.index()]
    }

    /// Touched positions with their coefficients.
    pub fn entries(&self) -> impl Iterator<Item = (Terminal, Terminal, Coefficient)> + '_ {
        Terminal::ALL.into_iter().flat_map(move |r| {
            Terminal::ALL
                .into_iter()
                .filter(move |&c| self.is_touched(r, c))
                .map(move |c| (r, c, self.get(r, c)))
        })
    }

    /// Nonlinear equivalent current `I0 - Σ G·V0` leaving `t`.
    #[inline]
    pub fn equivalent_current(&self, t: Terminal) -> f64 {
        self.ieq[t.index()]
    }

    /// Integrated charge current into `t`.
    #[inline]
    pub fn charge_current(&self, t: Terminal) -> f64 {
        self.charge_current[t.index()]
    }

    /// `Σ xc·V0` along the row of `t`.
    #[inline]
    pub fn charge_linear(&self, t: Terminal) -> f64 {
        self.charge_linear[t.index()]
    }

    /// Build the coefficients for one instance.
    pub fn build(input: &KernelInput<'_>) -> Self {
        let mut b = Builder {
            set: StampSet::default(),
            bias: &input.op.bias,
            topology: input.topology,
            thermal: input.features.selfheat,
        };
        b.channel(input.view);
        b.junctions(input.op);
        b.body_currents(input.view, input.features);
        if input.features.igc {
            b.gate_tunneling(input.view);
        }
        b.gate_resistance(input.view, input.features, input.parasitics);
        b.linear_parasitics(input.features, input.parasitics);
        if input.features.selfheat {
            b.thermal(input.view, input.parasitics);
        }
        b.capacitances(input.op, input.view, input.features, input.parasitics);
        b.charge_currents(input.op, input.features);
        b.finish()
    }

    /// Touched-position pattern for an instance with these features.
    ///
    /// The kernel gates every block on features only, so the pattern does
    /// not depend on operating-point values.
    pub fn pattern(features: &Features, topology: &Topology) -> Self {
        let op = OperatingPoint::default();
        let view = ModeView::resolve(&op, Default::default());
        let parasitics = Parasitics::default();
        Self::build(&KernelInput {
            op: &op,
            view: &view,
            features,
            parasitics: &parasitics,
            topology,
        })
    }
}

/// Everything the kernel reads.
#[derive(Debug, Clone, Copy)]
pub struct KernelInput<'a> {
    pub op: &'a OperatingPoint,
    pub view: &'a ModeView,
    pub features: &'a Features,
    pub parasitics: &'a Parasitics,
    pub topology: &'a Topology,
}

struct Builder<'a> {
    set: StampSet,
    bias: &'a Bias,
    topology: &'a Topology,
    thermal: bool,
}

impl Builder<'_> {
    fn voltage(&self, t: Terminal) -> f64 {
        self.bias.voltage(self.topology.canonical(t))
    }

    fn add_g(&mut self, row: Terminal, col: Terminal, g: f64) {
        self.set.coeff[row.index()][col.index()].g += g;
        self.set.touched[row.index()][col.index()] = true;
    }

    fn add_xc(&mut self, row: Terminal, col: Terminal, c: f64) {
        self.set.coeff[row.index()][col.index()].xc += c;
        self.set.touched[row.index()][col.index()] = true;
    }

    /// Linear conductance between `a` and `b`.
    fn conductance(&mut self, a: Terminal, b: Terminal, g: f64) {
        self.add_g(a, a, g);
        self.add_g(a, b, -g);
        self.add_g(b, a, -g);
        self.add_g(b, b, g);
    }

    /// Linear capacitor between `a` and `b`.
    fn capacitor(&mut self, a: Terminal, b: Terminal, c: f64) {
        self.add_xc(a, a, c);
        self.add_xc(a, b, -c);
        self.add_xc(b, a, -c);
        self.add_xc(b, b, c);
    }

    /// Controlled current leaving `from` and entering `to` (`None` for a
    /// current injected from outside the device).
    ///
    /// Partials on the temperature terminal are dropped without self-heating.
    fn branch(&mut self, from: Terminal, to: Option<Terminal>, current: f64, partials: &[(Terminal, f64)]) {
        let mut ieq = current;
        for &(t, g) in partials {
            if t == Terminal::T && !self.thermal {
                continue;
            }
            self.add_g(from, t, g);
            if let Some(to) = to {
                self.add_g(to, t, -g);
            }
            ieq -= g * self.voltage(t);
        }
        self.set.ieq[from.index()] += ieq;
        if let Some(to) = to {
            self.set.ieq[to.index()] -= ieq;
        }
    }

    /// Side-branch current from `near` into `to`.
    fn side(&mut self, near: Terminal, far: Terminal, to: Terminal, gate: Terminal, s: &SideBranch) {
        self.branch(
            near,
            Some(to),
            s.current,
            &[
                (gate, s.dg),
                (near, s.dnear),
                (far, s.dfar()),
                (Terminal::B, s.db),
                (Terminal::E, s.de),
                (Terminal::T, s.dt),
            ],
        );
    }

    /// Side-branch current from the gate into `near`.
    fn gate_side(&mut self, near: Terminal, far: Terminal, s: &SideBranch) {
        self.branch(
            Terminal::Gi,
            Some(near),
            s.current,
            &[
                (Terminal::Gi, s.dg),
                (near, s.dnear),
                (far, s.dfar()),
                (Terminal::B, s.db),
                (Terminal::E, s.de),
                (Terminal::T, s.dt),
            ],
        );
    }

    fn channel(&mut self, v: &ModeView) {
        let [gdp, gg, gsp, gb, ge, gt] = v.channel_partials();
        self.branch(
            Terminal::Dp,
            Some(Terminal::Sp),
            v.ids,
            &[
                (Terminal::Dp, gdp),
                (Terminal::Gi, gg),
                (Terminal::Sp, gsp),
                (Terminal::B, gb),
                (Terminal::E, ge),
                (Terminal::T, gt),
            ],
        );
    }

    fn junctions(&mut self, op: &OperatingPoint) {
        self.branch(
            Terminal::Db,
            Some(Terminal::Dp),
            op.ibd,
            &[
                (Terminal::Db, op.gbd),
                (Terminal::Dp, -op.gbd),
                (Terminal::T, op.gbdt),
            ],
        );
        self.branch(
            Terminal::Sb,
            Some(Terminal::Sp),
            op.ibs,
            &[
                (Terminal::Sb, op.gbs),
                (Terminal::Sp, -op.gbs),
                (Terminal::T, op.gbst),
            ],
        );
    }

    fn body_currents(&mut self, v: &ModeView, features: &Features) {
        if features.ideal_fd() {
            return;
        }
        let gate = Terminal::Gi;
        self.side(Terminal::Dp, Terminal::Sp, Terminal::B, gate, &v.impact_d);
        self.side(Terminal::Sp, Terminal::Dp, Terminal::B, gate, &v.impact_s);
        self.side(Terminal::Dp, Terminal::Sp, Terminal::B, gate, &v.gidl);
        self.side(Terminal::Sp, Terminal::Dp, Terminal::B, gate, &v.gisl);
    }

    fn gate_tunneling(&mut self, v: &ModeView) {
        self.gate_side(Terminal::Dp, Terminal::Sp, &v.igd);
        self.gate_side(Terminal::Dp, Terminal::Sp, &v.igcd);
        self.gate_side(Terminal::Sp, Terminal::Dp, &v.igs);
        self.gate_side(Terminal::Sp, Terminal::Dp, &v.igcs);
        let igb = &v.igb;
        self.branch(
            Terminal::Gi,
            Some(Terminal::B),
            igb.current,
            &[
                (Terminal::Gi, igb.dg),
                (Terminal::Dp, igb.dd),
                (Terminal::Sp, igb.ds()),
                (Terminal::B, igb.db),
                (Terminal::E, igb.de),
                (Terminal::T, igb.dt),
            ],
        );
    }

    fn gate_resistance(&mut self, v: &ModeView, features: &Features, p: &Parasitics) {
        match features.rgate {
            GateResistance::Lumped => self.conductance(Terminal::G, Terminal::Gi, p.grgeltd),
            GateResistance::Distributed => {
                self.conductance(Terminal::G, Terminal::Gm, p.grgeltd);
                let net = &v.gate_network;
                let current =
                    net.gcrg * (self.voltage(Terminal::Gm) - self.voltage(Terminal::Gi));
                self.branch(
                    Terminal::Gm,
                    Some(Terminal::Gi),
                    current,
                    &[
                        (Terminal::Gm, net.gcrg),
                        (Terminal::Gi, net.gcrgg - net.gcrg),
                        (Terminal::Dp, net.gcrgd),
                        (Terminal::Sp, net.gcrgs),
                        (Terminal::B, net.gcrgb()),
                    ],
                );
            }
            GateResistance::None => {}
        }
    }

    fn linear_parasitics(&mut self, features: &Features, p: &Parasitics) {
        if features.rds {
            self.conductance(Terminal::D, Terminal::Dp, p.gdpr);
            self.conductance(Terminal::S, Terminal::Sp, p.gspr);
        }
        if features.rbody {
            self.conductance(Terminal::Db, Terminal::B, p.grbdb);
            self.conductance(Terminal::Sb, Terminal::B, p.grbsb);
        }
        if features.body_contact {
            self.conductance(Terminal::P, Terminal::B, p.gbp);
        }
    }

    fn thermal(&mut self, v: &ModeView, p: &Parasitics) {
        self.add_g(Terminal::T, Terminal::T, p.gth);
        self.add_xc(Terminal::T, Terminal::T, p.cth);
        let pw = &v.power;
        // Dissipation enters the temperature row as a negative outflow.
        self.branch(
            Terminal::T,
            None,
            -pw.power,
            &[
                (Terminal::Gi, -pw.gpg),
                (Terminal::Dp, -pw.gpd),
                (Terminal::Sp, -pw.gps()),
                (Terminal::B, -pw.gpb),
                (Terminal::E, -pw.gpe),
                (Terminal::T, -pw.gpt),
            ],
        );
    }

    fn capacitances(&mut self, op: &OperatingPoint, v: &ModeView, features: &Features, p: &Parasitics) {
        const INTRINSIC: [Terminal; 4] = [Terminal::Gi, Terminal::Dp, Terminal::Sp, Terminal::B];
        let full = v.caps.full();
        for (i, &row) in INTRINSIC.iter().enumerate() {
            for (j, &col) in INTRINSIC.iter().enumerate() {
                self.add_xc(row, col, full[i][j]);
            }
        }

        let overlap_gate = if features.rgate == GateResistance::Distributed {
            Terminal::Gm
        } else {
            Terminal::Gi
        };
        self.capacitor(overlap_gate, Terminal::Dp, p.cgdo);
        self.capacitor(overlap_gate, Terminal::Sp, p.cgso);
        self.capacitor(overlap_gate, Terminal::E, p.cgeo);

        if !features.ideal_fd() {
            self.capacitor(Terminal::Db, Terminal::Dp, op.capbd);
            self.capacitor(Terminal::Sb, Terminal::Sp, op.capbs);
        }
        self.capacitor(Terminal::Dp, Terminal::E, p.cdbox);
        self.capacitor(Terminal::Sp, Terminal::E, p.csbox);

        if features.selfheat {
            let tc = &v.thermal_caps;
            self.add_xc(Terminal::Gi, Terminal::T, tc.cgt);
            self.add_xc(Terminal::Dp, Terminal::T, tc.cdt);
            self.add_xc(Terminal::Sp, Terminal::T, tc.cst());
            self.add_xc(Terminal::B, Terminal::T, tc.cbt);
        }
    }

    fn charge_currents(&mut self, op: &OperatingPoint, features: &Features) {
        let cq = &op.charge_currents;
        let overlap_gate = if features.rgate == GateResistance::Distributed {
            Terminal::Gm
        } else {
            Terminal::Gi
        };
        let mut put = |t: Terminal, value: f64| self.set.charge_current[t.index()] += value;
        put(Terminal::Gi, cq.gate);
        put(overlap_gate, cq.gate_overlap);
        put(Terminal::Dp, cq.drain);
        put(Terminal::Sp, cq.source);
        put(Terminal::B, cq.body);
        put(Terminal::E, cq.substrate);
        put(Terminal::Db, cq.drain_body);
        put(Terminal::Sb, cq.source_body);
        if features.selfheat {
            put(Terminal::T, cq.thermal);
        }
    }

    fn finish(mut self) -> StampSet {
        let mut volts = [0.0; NUM_TERMINALS];
        for t in Terminal::ALL {
            volts[t.index()] = self.voltage(t);
        }
        for row in Terminal::ALL {
            let r = row.index();
            self.set.charge_linear[r] = Terminal::ALL
                .iter()
                .filter(|c| self.set.touched[r][c.index()])
                .map(|c| self.set.coeff[r][c.index()].xc * volts[c.index()])
                .sum();
        }
        self.set
    }
}
