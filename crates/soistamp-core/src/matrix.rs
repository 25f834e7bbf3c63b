//! Matrix-entry handles and the sink devices stamp into.
//!
//! A device never addresses the system matrix by (row, column) during a
//! stamp. At setup it asks a [`MatrixStructure`] for one [`EntryHandle`] per
//! position it can touch; every later stamp is an `add_real`/`add_imag` on
//! those handles. Positions involving ground have no handle (`None`), and
//! writes through a `None` handle are no-ops.

use std::collections::HashMap;

use nalgebra::{DMatrix, DVector};
use num_complex::Complex64;

use crate::node::NodeId;

/// Opaque reference to one (row, column) position of a system matrix.
///
/// Each position holds a real/imaginary pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryHandle(u32);

impl EntryHandle {
    /// Raw slot index inside the owning matrix.
    pub fn slot(self) -> usize {
        self.0 as usize
    }
}

/// Setup-time interface: resolve a (row, column) node pair to a handle.
pub trait MatrixStructure {
    /// Reserve (or find) the entry at `(row, col)`. Returns `None` when either
    /// node is ground.
    fn entry(&mut self, row: NodeId, col: NodeId) -> Option<EntryHandle>;
}

/// Stamp-time interface: accumulate into previously acquired entries.
pub trait MatrixSink {
    /// Add to the real half of an entry.
    fn add_real(&mut self, entry: EntryHandle, value: f64);

    /// Add to the imaginary half of an entry.
    fn add_imag(&mut self, entry: EntryHandle, value: f64);

    /// Add to the right-hand side at `node`. Ground is ignored.
    fn add_rhs(&mut self, node: NodeId, value: f64);

    /// `add_real` through an optional handle; `None` is a no-op.
    fn add_real_at(&mut self, entry: Option<EntryHandle>, value: f64) {
        if let Some(e) = entry {
            self.add_real(e, value);
        }
    }

    /// `add_imag` through an optional handle; `None` is a no-op.
    fn add_imag_at(&mut self, entry: Option<EntryHandle>, value: f64) {
        if let Some(e) = entry {
            self.add_imag(e, value);
        }
    }
}

/// Complex-valued sparse system matrix with a real right-hand side.
///
/// Entries are created on demand by [`MatrixStructure::entry`] and live for
/// the lifetime of the matrix; [`SparseMatrix::clear`] zeroes values without
/// dropping the structure, so handles stay valid across passes.
#[derive(Debug, Clone, Default)]
pub struct SparseMatrix {
    index: HashMap<(NodeId, NodeId), EntryHandle>,
    positions: Vec<(NodeId, NodeId)>,
    values: Vec<Complex64>,
    rhs: Vec<f64>,
}

impl SparseMatrix {
    /// Create an empty matrix.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of structural nonzeros.
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Zero all values and the right-hand side, keeping the structure.
    pub fn clear(&mut self) {
        self.values.fill(Complex64::new(0.0, 0.0));
        self.rhs.fill(0.0);
    }

    /// Value at `(row, col)`; zero if the position was never reserved.
    pub fn get(&self, row: NodeId, col: NodeId) -> Complex64 {
        self.index
            .get(&(row, col))
            .map(|h| self.values[h.slot()])
            .unwrap_or_default()
    }

    /// Value behind a handle.
    pub fn value(&self, entry: EntryHandle) -> Complex64 {
        self.values[entry.slot()]
    }

    /// Right-hand side at `node` (zero for ground or untouched nodes).
    pub fn rhs(&self, node: NodeId) -> f64 {
        node.index()
            .and_then(|i| self.rhs.get(i).copied())
            .unwrap_or(0.0)
    }

    /// Iterate over `(row, col, value)` in reservation order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, NodeId, Complex64)> + '_ {
        self.positions
            .iter()
            .zip(self.values.iter())
            .map(|(&(r, c), &v)| (r, c, v))
    }

    /// Largest node index referenced by the structure or the RHS.
    pub fn dimension(&self) -> usize {
        let from_entries = self
            .positions
            .iter()
            .flat_map(|&(r, c)| [r.as_u32(), c.as_u32()])
            .max()
            .unwrap_or(0) as usize;
        from_entries.max(self.rhs.len())
    }

    /// Export as a dense `n x n` complex matrix.
    pub fn to_dense(&self, n: usize) -> DMatrix<Complex64> {
        let mut dense = DMatrix::from_element(n, n, Complex64::new(0.0, 0.0));
        for (row, col, v) in self.iter() {
            if let (Some(r), Some(c)) = (row.index(), col.index()) {
                if r < n && c < n {
                    dense[(r, c)] += v;
                }
            }
        }
        dense
    }

    /// Export the right-hand side as a dense vector of length `n`.
    pub fn rhs_vector(&self, n: usize) -> DVector<f64> {
        DVector::from_fn(n, |i, _| self.rhs.get(i).copied().unwrap_or(0.0))
    }
}

impl MatrixStructure for SparseMatrix {
    fn entry(&mut self, row: NodeId, col: NodeId) -> Option<EntryHandle> {
        if row.is_ground() || col.is_ground() {
            return None;
        }
        if let Some(&h) = self.index.get(&(row, col)) {
            return Some(h);
        }
        let h = EntryHandle(self.values.len() as u32);
        self.index.insert((row, col), h);
        self.positions.push((row, col));
        self.values.push(Complex64::new(0.0, 0.0));
        Some(h)
    }
}

impl MatrixSink for SparseMatrix {
    fn add_real(&mut self, entry: EntryHandle, value: f64) {
        self.values[entry.slot()].re += value;
    }

    fn add_imag(&mut self, entry: EntryHandle, value: f64) {
        self.values[entry.slot()].im += value;
    }

    fn add_rhs(&mut self, node: NodeId, value: f64) {
        if let Some(i) = node.index() {
            if i >= self.rhs.len() {
                self.rhs.resize(i + 1, 0.0);
            }
            self.rhs[i] += value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_reuse() {
        let mut m = SparseMatrix::new();
        let a = m.entry(NodeId::new(1), NodeId::new(2));
        let b = m.entry(NodeId::new(1), NodeId::new(2));
        assert_eq!(a, b);
        assert_eq!(m.nnz(), 1);
    }

    #[test]
    fn test_ground_has_no_handle() {
        let mut m = SparseMatrix::new();
        assert!(m.entry(NodeId::GROUND, NodeId::new(1)).is_none());
        assert!(m.entry(NodeId::new(1), NodeId::GROUND).is_none());
        assert_eq!(m.nnz(), 0);
    }

    #[test]
    fn test_real_and_imag_halves() {
        let mut m = SparseMatrix::new();
        let h = m.entry(NodeId::new(1), NodeId::new(1)).unwrap();
        m.add_real(h, 2.0);
        m.add_imag(h, -3.0);
        m.add_real(h, 0.5);

        assert_eq!(m.get(NodeId::new(1), NodeId::new(1)), Complex64::new(2.5, -3.0));
    }

    #[test]
    fn test_none_handle_is_noop() {
        let mut m = SparseMatrix::new();
        let h = m.entry(NodeId::new(1), NodeId::new(1));
        m.add_real_at(None, 1.0);
        m.add_imag_at(None, 1.0);
        assert_eq!(m.value(h.unwrap()), Complex64::new(0.0, 0.0));
    }

    #[test]
    fn test_clear_keeps_structure() {
        let mut m = SparseMatrix::new();
        let h = m.entry(NodeId::new(2), NodeId::new(1)).unwrap();
        m.add_real(h, 1.0);
        m.add_rhs(NodeId::new(2), 4.0);
        m.clear();

        assert_eq!(m.nnz(), 1);
        assert_eq!(m.value(h), Complex64::new(0.0, 0.0));
        assert_eq!(m.rhs(NodeId::new(2)), 0.0);
        m.add_real(h, 1.0);
        assert_eq!(m.get(NodeId::new(2), NodeId::new(1)).re, 1.0);
    }

    #[test]
    fn test_rhs_ignores_ground() {
        let mut m = SparseMatrix::new();
        m.add_rhs(NodeId::GROUND, 1.0);
        m.add_rhs(NodeId::new(3), -1.5);
        assert_eq!(m.rhs(NodeId::GROUND), 0.0);
        assert_eq!(m.rhs(NodeId::new(3)), -1.5);
        assert_eq!(m.dimension(), 3);
    }

    #[test]
    fn test_to_dense() {
        let mut m = SparseMatrix::new();
        let h11 = m.entry(NodeId::new(1), NodeId::new(1)).unwrap();
        let h12 = m.entry(NodeId::new(1), NodeId::new(2)).unwrap();
        m.add_real(h11, 1.0);
        m.add_real(h12, -1.0);
        m.add_imag(h12, 0.25);

        let dense = m.to_dense(2);
        assert_eq!(dense[(0, 0)], Complex64::new(1.0, 0.0));
        assert_eq!(dense[(0, 1)], Complex64::new(-1.0, 0.25));
        assert_eq!(dense[(1, 1)], Complex64::new(0.0, 0.0));
    }
}
