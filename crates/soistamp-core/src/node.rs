//! Node identifiers and node allocation.

use std::collections::HashMap;
use std::fmt;

use crate::error::{Error, Result};

/// Unique identifier for a node in the circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// The ground node (node 0).
    pub const GROUND: NodeId = NodeId(0);

    /// Create a new NodeId from a raw value.
    pub fn new(id: u32) -> Self {
        NodeId(id)
    }

    /// Get the raw node ID value.
    pub fn as_u32(self) -> u32 {
        self.0
    }

    /// Check if this is the ground node.
    pub fn is_ground(self) -> bool {
        self.0 == 0
    }

    /// Zero-based matrix row of this node, `None` for ground.
    pub fn index(self) -> Option<usize> {
        if self.is_ground() {
            None
        } else {
            Some((self.0 - 1) as usize)
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ground() {
            write!(f, "GND")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// A node in the circuit graph.
#[derive(Debug, Clone)]
pub struct Node {
    /// Unique identifier for this node.
    id: NodeId,
    /// Optional name for the node (from netlist or device setup).
    name: Option<String>,
    /// Whether the node was created by a device for its own use.
    internal: bool,
}

impl Node {
    /// Create a new node with the given ID.
    pub fn new(id: NodeId) -> Self {
        Self {
            id,
            name: None,
            internal: false,
        }
    }

    /// Create a new node with the given ID and name.
    pub fn with_name(id: NodeId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: Some(name.into()),
            internal: false,
        }
    }

    /// Get the node's ID.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Get the node's name, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Check if this is the ground node.
    pub fn is_ground(&self) -> bool {
        self.id.is_ground()
    }

    /// Check if this node was created by a device (parasitic, thermal, body network).
    pub fn is_internal(&self) -> bool {
        self.internal
    }
}

/// Source of fresh node identifiers for device-internal nodes.
///
/// Devices call this once at setup time for every internal node an enabled
/// feature needs (drain/source prime, gate mid-node, body network, thermal).
pub trait NodeAllocator {
    /// Create a new internal node. `name` is informational (e.g. `"M1#dbody"`).
    fn internal_node(&mut self, name: &str) -> NodeId;
}

/// A table of named circuit nodes that also allocates device-internal nodes.
#[derive(Debug, Default)]
pub struct NodeTable {
    nodes: Vec<Node>,
    by_name: HashMap<String, NodeId>,
}

impl NodeTable {
    /// Create an empty table. Ground is implicit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a named external node and return its id.
    pub fn add_external(&mut self, name: impl Into<String>) -> Result<NodeId> {
        let name = name.into();
        if self.by_name.contains_key(&name) {
            return Err(Error::DuplicateNode(name));
        }
        let id = self.next_id();
        self.by_name.insert(name.clone(), id);
        self.nodes.push(Node::with_name(id, name));
        Ok(id)
    }

    /// Look up a node by name. `"0"` and `"gnd"` resolve to ground.
    pub fn find(&self, name: &str) -> Result<NodeId> {
        if name == "0" || name.eq_ignore_ascii_case("gnd") {
            return Ok(NodeId::GROUND);
        }
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| Error::NodeNotFound(name.to_string()))
    }

    /// Number of non-ground nodes (external and internal).
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// All nodes in creation order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    fn next_id(&self) -> NodeId {
        NodeId::new(self.nodes.len() as u32 + 1)
    }
}

impl NodeAllocator for NodeTable {
    fn internal_node(&mut self, name: &str) -> NodeId {
        let id = self.next_id();
        let mut node = Node::with_name(id, name);
        node.internal = true;
        self.nodes.push(node);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ground_node() {
        assert!(NodeId::GROUND.is_ground());
        assert_eq!(NodeId::GROUND.as_u32(), 0);
        assert_eq!(NodeId::GROUND.to_string(), "GND");
        assert_eq!(NodeId::GROUND.index(), None);
    }

    #[test]
    fn test_node_id() {
        let id = NodeId::new(42);
        assert!(!id.is_ground());
        assert_eq!(id.as_u32(), 42);
        assert_eq!(id.to_string(), "42");
        assert_eq!(id.index(), Some(41));
    }

    #[test]
    fn test_node_with_name() {
        let node = Node::with_name(NodeId::new(1), "vdd");
        assert_eq!(node.id().as_u32(), 1);
        assert_eq!(node.name(), Some("vdd"));
        assert!(!node.is_internal());
    }

    #[test]
    fn test_table_allocates_internal_after_external() {
        let mut table = NodeTable::new();
        let d = table.add_external("d").unwrap();
        let g = table.add_external("g").unwrap();
        let dp = table.internal_node("M1#dprime");

        assert_eq!(d, NodeId::new(1));
        assert_eq!(g, NodeId::new(2));
        assert_eq!(dp, NodeId::new(3));
        assert!(table.nodes()[2].is_internal());
        assert_eq!(table.num_nodes(), 3);
    }

    #[test]
    fn test_table_lookup() {
        let mut table = NodeTable::new();
        let out = table.add_external("out").unwrap();

        assert_eq!(table.find("out").unwrap(), out);
        assert_eq!(table.find("0").unwrap(), NodeId::GROUND);
        assert!(matches!(table.find("nope"), Err(Error::NodeNotFound(_))));
        assert!(matches!(
            table.add_external("out"),
            Err(Error::DuplicateNode(_))
        ));
    }
}
