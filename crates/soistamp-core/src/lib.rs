//! Core node and matrix abstractions for soistamp.
//!
//! This crate provides the data structures shared by the device engine and
//! the pass driver: node identifiers, node allocation for internal device
//! nodes, and the matrix-sink interface devices stamp through. A concrete
//! complex-valued [`SparseMatrix`] sink is included for analyses and tests.

pub mod error;
pub mod matrix;
pub mod node;

pub use error::{Error, Result};
pub use matrix::{EntryHandle, MatrixSink, MatrixStructure, SparseMatrix};
pub use node::{Node, NodeAllocator, NodeId, NodeTable};
