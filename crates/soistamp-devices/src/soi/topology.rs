//! Terminals, internal-node allocation and matrix handles.
//!
//! An instance always stamps in terms of its thirteen [`Terminal`]s. Optional
//! sub-networks that are switched off do not get internal nodes; their
//! terminals alias an existing node instead:
//!
//! - `Dp → D`, `Sp → S` without source/drain resistance
//! - `Gi → G` without gate resistance, `Gm → Gi` unless distributed
//! - `Db, Sb → B` without a body resistance network
//! - `B → Sp` in ideal fully-depleted mode
//! - `T → ground` without self-heating, `P → ground` without a body contact

use soistamp_core::{EntryHandle, MatrixStructure, NodeAllocator, NodeId};

use super::kernel::StampSet;
use super::params::{Features, GateResistance};

/// Number of terminals (external and internal).
pub const NUM_TERMINALS: usize = 13;

/// Device terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Terminal {
    /// External drain.
    D,
    /// External gate.
    G,
    /// External source.
    S,
    /// Substrate (back gate).
    E,
    /// Body contact.
    P,
    /// Drain prime.
    Dp,
    /// Source prime.
    Sp,
    /// Intrinsic gate.
    Gi,
    /// Gate mid-node.
    Gm,
    /// Intrinsic body.
    B,
    /// Drain-side body.
    Db,
    /// Source-side body.
    Sb,
    /// Temperature rise.
    T,
}

impl Terminal {
    pub const ALL: [Terminal; NUM_TERMINALS] = [
        Terminal::D,
        Terminal::G,
        Terminal::S,
        Terminal::E,
        Terminal::P,
        Terminal::Dp,
        Terminal::Sp,
        Terminal::Gi,
        Terminal::Gm,
        Terminal::B,
        Terminal::Db,
        Terminal::Sb,
        Terminal::T,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// `false` for the temperature terminal, whose row is a power balance.
    #[inline]
    pub fn is_electrical(self) -> bool {
        self != Terminal::T
    }

    pub fn name(self) -> &'static str {
        match self {
            Terminal::D => "d",
            Terminal::G => "g",
            Terminal::S => "s",
            Terminal::E => "e",
            Terminal::P => "p",
            Terminal::Dp => "dprime",
            Terminal::Sp => "sprime",
            Terminal::Gi => "gi",
            Terminal::Gm => "gm",
            Terminal::B => "body",
            Terminal::Db => "db",
            Terminal::Sb => "sb",
            Terminal::T => "temp",
        }
    }
}

/// Nodes the instance is connected to from the outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExternalNodes {
    pub drain: NodeId,
    pub gate: NodeId,
    pub source: NodeId,
    pub substrate: NodeId,
    /// Body contact; `None` for a floating body.
    pub body: Option<NodeId>,
}

impl ExternalNodes {
    /// Four-terminal (floating body) connection.
    pub fn new(drain: NodeId, gate: NodeId, source: NodeId, substrate: NodeId) -> Self {
        Self {
            drain,
            gate,
            source,
            substrate,
            body: None,
        }
    }

    /// Add a body contact.
    pub fn with_body(mut self, body: NodeId) -> Self {
        self.body = Some(body);
        self
    }
}

/// Terminal-to-node mapping of one instance.
#[derive(Debug, Clone, PartialEq)]
pub struct Topology {
    nodes: [NodeId; NUM_TERMINALS],
    canonical: [Terminal; NUM_TERMINALS],
}

impl Topology {
    /// Allocate internal nodes for every enabled sub-network and alias the rest.
    pub fn build(
        name: &str,
        ext: &ExternalNodes,
        features: &Features,
        alloc: &mut dyn NodeAllocator,
    ) -> Self {
        let mut nodes = [NodeId::GROUND; NUM_TERMINALS];
        let mut canonical = Terminal::ALL;
        let mut internal = |suffix: &str| alloc.internal_node(&format!("{name}#{suffix}"));

        nodes[Terminal::D.index()] = ext.drain;
        nodes[Terminal::G.index()] = ext.gate;
        nodes[Terminal::S.index()] = ext.source;
        nodes[Terminal::E.index()] = ext.substrate;
        if features.body_contact {
            nodes[Terminal::P.index()] = ext.body.unwrap_or(NodeId::GROUND);
        }

        nodes[Terminal::Dp.index()] = if features.rds {
            internal(Terminal::Dp.name())
        } else {
            ext.drain
        };
        nodes[Terminal::Sp.index()] = if features.rds {
            internal(Terminal::Sp.name())
        } else {
            ext.source
        };

        nodes[Terminal::Gi.index()] = if features.rgate == GateResistance::None {
            ext.gate
        } else {
            internal(Terminal::Gi.name())
        };
        if features.rgate == GateResistance::Distributed {
            nodes[Terminal::Gm.index()] = internal(Terminal::Gm.name());
        } else {
            nodes[Terminal::Gm.index()] = nodes[Terminal::Gi.index()];
            canonical[Terminal::Gm.index()] = Terminal::Gi;
        }

        if features.ideal_fd() {
            nodes[Terminal::B.index()] = nodes[Terminal::Sp.index()];
            canonical[Terminal::B.index()] = Terminal::Sp;
        } else {
            nodes[Terminal::B.index()] = internal(Terminal::B.name());
        }

        if features.rbody {
            nodes[Terminal::Db.index()] = internal(Terminal::Db.name());
            nodes[Terminal::Sb.index()] = internal(Terminal::Sb.name());
        } else {
            for t in [Terminal::Db, Terminal::Sb] {
                nodes[t.index()] = nodes[Terminal::B.index()];
                canonical[t.index()] = canonical[Terminal::B.index()];
            }
        }

        if features.selfheat {
            nodes[Terminal::T.index()] = internal(Terminal::T.name());
        }

        Self { nodes, canonical }
    }

    /// Node behind a terminal (after aliasing).
    #[inline]
    pub fn node(&self, t: Terminal) -> NodeId {
        self.nodes[t.index()]
    }

    /// Terminal whose bias voltage `t` carries (itself unless aliased to an
    /// intrinsic terminal with a different bias variable).
    #[inline]
    pub fn canonical(&self, t: Terminal) -> Terminal {
        self.canonical[t.index()]
    }
}

/// Matrix handles for every terminal pair the kernel can touch.
#[derive(Debug, Clone, PartialEq)]
pub struct StampHandles {
    entries: [[Option<EntryHandle>; NUM_TERMINALS]; NUM_TERMINALS],
}

impl StampHandles {
    /// Reserve one entry per touched position of `pattern`.
    ///
    /// Pairs that resolve to ground get `None`.
    pub fn acquire(
        topology: &Topology,
        pattern: &StampSet,
        structure: &mut dyn MatrixStructure,
    ) -> Self {
        let mut entries = [[None; NUM_TERMINALS]; NUM_TERMINALS];
        for row in Terminal::ALL {
            for col in Terminal::ALL {
                if pattern.is_touched(row, col) {
                    entries[row.index()][col.index()] =
                        structure.entry(topology.node(row), topology.node(col));
                }
            }
        }
        Self { entries }
    }

    #[inline]
    pub fn get(&self, row: Terminal, col: Terminal) -> Option<EntryHandle> {
        self.entries[row.index()][col.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::soi::params::SoiMode;
    use soistamp_core::NodeTable;

    fn external(table: &mut NodeTable) -> ExternalNodes {
        let d = table.add_external("d").unwrap();
        let g = table.add_external("g").unwrap();
        let s = table.add_external("s").unwrap();
        ExternalNodes::new(d, g, s, NodeId::GROUND)
    }

    #[test]
    fn test_minimal_topology_allocates_body_only() {
        let mut table = NodeTable::new();
        let ext = external(&mut table);
        let topo = Topology::build("M1", &ext, &Features::minimal(), &mut table);

        assert_eq!(topo.node(Terminal::Dp), ext.drain);
        assert_eq!(topo.node(Terminal::Sp), ext.source);
        assert_eq!(topo.node(Terminal::Gi), ext.gate);
        assert_eq!(topo.node(Terminal::Gm), ext.gate);
        assert_eq!(topo.node(Terminal::Db), topo.node(Terminal::B));
        assert_eq!(topo.node(Terminal::T), NodeId::GROUND);
        assert_eq!(topo.node(Terminal::P), NodeId::GROUND);
        assert_eq!(topo.canonical(Terminal::Gm), Terminal::Gi);
        assert_eq!(topo.canonical(Terminal::Sb), Terminal::B);
        // three external plus the body
        assert_eq!(table.num_nodes(), 4);
        assert_eq!(table.nodes()[3].name(), Some("M1#body"));
    }

    #[test]
    fn test_full_topology_allocates_every_internal_node() {
        let mut table = NodeTable::new();
        let p = table.add_external("p").unwrap();
        let ext = external(&mut table).with_body(p);
        let topo = Topology::build("M2", &ext, &Features::all(), &mut table);

        // dprime, sprime, gi, gm, body, db, sb, temp
        assert_eq!(table.num_nodes(), 4 + 8);
        assert_eq!(topo.node(Terminal::P), p);
        let mut seen: Vec<_> = [
            Terminal::Dp,
            Terminal::Sp,
            Terminal::Gi,
            Terminal::Gm,
            Terminal::B,
            Terminal::Db,
            Terminal::Sb,
            Terminal::T,
        ]
        .iter()
        .map(|&t| topo.node(t))
        .collect();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 8);
        for t in Terminal::ALL {
            assert_eq!(topo.canonical(t), t);
        }
    }

    #[test]
    fn test_ideal_fd_ties_body_to_source_prime() {
        let mut table = NodeTable::new();
        let ext = external(&mut table);
        let mut features = Features::minimal();
        features.soi = SoiMode::IdealFullyDepleted;
        let topo = Topology::build("M3", &ext, &features, &mut table);

        assert_eq!(topo.node(Terminal::B), ext.source);
        assert_eq!(topo.node(Terminal::Sb), ext.source);
        assert_eq!(topo.canonical(Terminal::B), Terminal::Sp);
        assert_eq!(topo.canonical(Terminal::Db), Terminal::Sp);
        assert_eq!(table.num_nodes(), 3);
    }

    #[test]
    fn test_lumped_gate_has_no_mid_node() {
        let mut table = NodeTable::new();
        let ext = external(&mut table);
        let mut features = Features::minimal();
        features.rgate = GateResistance::Lumped;
        let topo = Topology::build("M4", &ext, &features, &mut table);

        assert_ne!(topo.node(Terminal::Gi), ext.gate);
        assert_eq!(topo.node(Terminal::Gm), topo.node(Terminal::Gi));
    }
}
