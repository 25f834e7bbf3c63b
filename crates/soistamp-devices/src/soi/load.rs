//! Analysis adapters: write a [`StampSet`] into a matrix sink.
//!
//! - DC/transient: real entries `g + ag0·xc`, RHS `-(ieq + cq - ag0·Σxc·V)`
//! - AC: complex entries `g + jω·xc`; evaluated through the pole-zero path
//!   with `s = jω`, so the two agree bit for bit
//! - pole-zero: `g + s·xc`
//! - noise: no matrix writes

use num_complex::Complex64;
use soistamp_core::{MatrixSink, SparseMatrix};

use super::kernel::StampSet;
use super::topology::{StampHandles, Terminal, Topology};
use crate::analysis::Analysis;

/// Apply `set` for `analysis` through `handles`.
pub fn apply(
    set: &StampSet,
    topology: &Topology,
    handles: &StampHandles,
    analysis: &Analysis<'_>,
    sink: &mut dyn MatrixSink,
) {
    match *analysis {
        Analysis::DcOrTransient { ag0 } => real(set, topology, handles, ag0, sink),
        Analysis::Ac { omega } => complex(set, handles, Complex64::new(0.0, omega), sink),
        Analysis::PoleZero { s } => complex(set, handles, s, sink),
        Analysis::Noise { .. } => {}
    }
}

fn real(set: &StampSet, topology: &Topology, handles: &StampHandles, ag0: f64, sink: &mut dyn MatrixSink) {
    let transient = ag0 != 0.0;
    for (row, col, c) in set.entries() {
        let value = if transient { c.g + ag0 * c.xc } else { c.g };
        sink.add_real_at(handles.get(row, col), value);
    }
    for t in Terminal::ALL {
        let mut current = set.equivalent_current(t);
        if transient {
            current += set.charge_current(t) - ag0 * set.charge_linear(t);
        }
        sink.add_rhs(topology.node(t), -current);
    }
}

fn complex(set: &StampSet, handles: &StampHandles, s: Complex64, sink: &mut dyn MatrixSink) {
    for (row, col, c) in set.entries() {
        let h = handles.get(row, col);
        let re = if s.re == 0.0 { c.g } else { c.g + s.re * c.xc };
        sink.add_real_at(h, re);
        sink.add_imag_at(h, s.im * c.xc);
    }
}

/// A private copy of the instance's matrix contributions, used by
/// sensitivity and adjoint analyses.
///
/// The mirror is zeroed at the start of every stamp and then receives exactly
/// what the primary sink receives.
#[derive(Debug, Clone)]
pub struct AdjointMirror {
    matrix: SparseMatrix,
    handles: StampHandles,
}

impl AdjointMirror {
    /// Reserve the same positions as the primary matrix.
    pub fn new(topology: &Topology, pattern: &StampSet) -> Self {
        let mut matrix = SparseMatrix::new();
        let handles = StampHandles::acquire(topology, pattern, &mut matrix);
        Self { matrix, handles }
    }

    pub(crate) fn restamp(&mut self, set: &StampSet, topology: &Topology, analysis: &Analysis<'_>) {
        self.matrix.clear();
        apply(set, topology, &self.handles, analysis, &mut self.matrix);
    }

    pub fn matrix(&self) -> &SparseMatrix {
        &self.matrix
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::soi::kernel::KernelInput;
    use crate::soi::mode::{Mode, ModeView};
    use crate::soi::params::Features;
    use crate::soi::synthetic;
    use crate::soi::topology::ExternalNodes;
    use soistamp_core::{NodeId, NodeTable};

    struct Fixture {
        topology: Topology,
        set: StampSet,
        matrix: SparseMatrix,
        handles: StampHandles,
    }

    fn fixture(features: Features, seed: u64) -> Fixture {
        let mut table = NodeTable::new();
        let d = table.add_external("d").unwrap();
        let g = table.add_external("g").unwrap();
        let s = table.add_external("s").unwrap();
        let e = table.add_external("e").unwrap();
        let p = table.add_external("p").unwrap();
        let ext = ExternalNodes::new(d, g, s, e).with_body(p);
        let topology = Topology::build("M1", &ext, &features, &mut table);
        let op = synthetic::operating_point(seed);
        let view = ModeView::resolve(&op, Mode::from_vds(op.bias.vds));
        let parasitics = synthetic::parasitics(seed);
        let set = StampSet::build(&KernelInput {
            op: &op,
            view: &view,
            features: &features,
            parasitics: &parasitics,
            topology: &topology,
        });
        let mut matrix = SparseMatrix::new();
        let pattern = StampSet::pattern(&features, &topology);
        let handles = StampHandles::acquire(&topology, &pattern, &mut matrix);
        Fixture {
            topology,
            set,
            matrix,
            handles,
        }
    }

    #[test]
    fn test_dc_ignores_capacitance() {
        let mut f = fixture(Features::minimal(), 1);
        apply(&f.set, &f.topology, &f.handles, &Analysis::DcOrTransient { ag0: 0.0 }, &mut f.matrix);
        let dp = f.topology.node(Terminal::Dp);
        let gi = f.topology.node(Terminal::Gi);
        let expected = f.set.get(Terminal::Dp, Terminal::Gi).g;
        assert_eq!(f.matrix.get(dp, gi).re, expected);
        assert_eq!(f.matrix.get(dp, gi).im, 0.0);
    }

    #[test]
    fn test_transient_folds_capacitance() {
        let mut f = fixture(Features::minimal(), 2);
        let ag0 = 1e9;
        apply(&f.set, &f.topology, &f.handles, &Analysis::DcOrTransient { ag0 }, &mut f.matrix);
        let c = f.set.get(Terminal::Gi, Terminal::Gi);
        let gi = f.topology.node(Terminal::Gi);
        // Gi aliases the external gate, which also receives overlap terms,
        // all of which are written at (Gi, Gi) in terminal space.
        assert_eq!(f.matrix.get(gi, gi).re, c.g + ag0 * c.xc);
    }

    #[test]
    fn test_ac_matches_pole_zero_on_imaginary_axis() {
        for seed in 0..10 {
            let mut ac = fixture(Features::all(), seed);
            let mut pz = fixture(Features::all(), seed);
            let omega = 2.0 * std::f64::consts::PI * 1e6;
            apply(&ac.set, &ac.topology, &ac.handles, &Analysis::Ac { omega }, &mut ac.matrix);
            apply(
                &pz.set,
                &pz.topology,
                &pz.handles,
                &Analysis::PoleZero {
                    s: Complex64::new(0.0, omega),
                },
                &mut pz.matrix,
            );
            let a: Vec<_> = ac.matrix.iter().collect();
            let p: Vec<_> = pz.matrix.iter().collect();
            assert_eq!(a, p);
        }
    }

    #[test]
    fn test_pole_zero_real_part() {
        let mut f = fixture(Features::minimal(), 3);
        let s = Complex64::new(-1e6, 2e6);
        apply(&f.set, &f.topology, &f.handles, &Analysis::PoleZero { s }, &mut f.matrix);
        let c = f.set.get(Terminal::Dp, Terminal::Dp);
        let dp = f.topology.node(Terminal::Dp);
        let v = f.matrix.get(dp, dp);
        // Dp aliases D but nothing else lands at (D, D).
        assert_eq!(v.re, c.g + s.re * c.xc);
        assert_eq!(v.im, s.im * c.xc);
    }

    #[test]
    fn test_noise_writes_nothing() {
        let mut f = fixture(Features::all(), 4);
        let transfer = |_: NodeId, _: NodeId| Complex64::new(1.0, 0.0);
        let data = crate::analysis::NoiseData::first(1e3, 1.0);
        let analysis = Analysis::Noise {
            mode: crate::analysis::NoiseMode::Density,
            data: &data,
            transfer: &transfer,
        };
        apply(&f.set, &f.topology, &f.handles, &analysis, &mut f.matrix);
        assert!(f.matrix.iter().all(|(_, _, v)| v == Complex64::new(0.0, 0.0)));
    }

    #[test]
    fn test_node_space_kcl() {
        for seed in 0..20 {
            let mut f = fixture(Features::all(), seed);
            apply(&f.set, &f.topology, &f.handles, &Analysis::DcOrTransient { ag0: 1e10 }, &mut f.matrix);
            let thermal = f.topology.node(Terminal::T);
            let n = f.matrix.dimension();
            let dense = f.matrix.to_dense(n);
            let thermal_row = thermal.index().unwrap();
            for col in 0..n {
                if col == thermal_row {
                    continue;
                }
                let sum: f64 = (0..n).filter(|&r| r != thermal_row).map(|r| dense[(r, col)].re).sum();
                assert!(sum.abs() < 1e-9, "seed {seed} column {col}: {sum}");
            }
        }
    }

    #[test]
    fn test_mirror_duplicates_primary() {
        let mut f = fixture(Features::all(), 5);
        let pattern = StampSet::pattern(&Features::all(), &f.topology);
        let mut mirror = AdjointMirror::new(&f.topology, &pattern);
        let analysis = Analysis::DcOrTransient { ag0: 0.0 };
        apply(&f.set, &f.topology, &f.handles, &analysis, &mut f.matrix);
        mirror.restamp(&f.set, &f.topology, &analysis);
        mirror.restamp(&f.set, &f.topology, &analysis);

        let primary: Vec<_> = f.matrix.iter().collect();
        let copy: Vec<_> = mirror.matrix().iter().collect();
        assert_eq!(primary, copy);
    }
}
