//! Worker-local block with a one-cell halo, and its edge codec.
//!
//! A block is `(length_m + 2) × (length_n + 2)` labels, row-major. Row `i`
//! walks the m axis, column `j` the n axis; rows `0` / `length_m + 1` and
//! columns `0` / `length_n + 1` are halo.
//!
//! Edge codec: [`Block::extract_edge`] reads the boundary-adjacent *interior*
//! line on a side, [`Block::inject_edge`] writes the *halo* line on a side.
//! An edge extracted on side `d` of one block is injected on side
//! `d.opposite()` of the block across that side.
//!
//! # Absorbing edges
//! Halo lines marked absorbing (the n-axis sides at the true grid boundary)
//! start zeroed and are never written afterwards: injecting into one is an
//! error, and [`DebugInvariants`] checks that they are still zero.

use crate::debug_invariants::{DebugInvariants, ensure_zero_line};
use crate::grid::decomposition::{Decomposition, Direction};
use crate::percolate_error::PercolateError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    rows: usize,
    cols: usize,
    cells: Vec<u32>,
    absorbing: [bool; 4],
}

impl Block {
    /// All-zero block shaped for `decomp`.
    pub fn zeroed(decomp: &Decomposition) -> Self {
        let (rows, cols) = decomp.block_shape();
        Self {
            rows,
            cols,
            cells: vec![0; rows * cols],
            absorbing: [false; 4],
        }
    }

    /// Wrap a flat row-major buffer, which must match the block shape.
    pub fn from_cells(decomp: &Decomposition, cells: Vec<u32>) -> Result<Self, PercolateError> {
        let (rows, cols) = decomp.block_shape();
        if cells.len() != rows * cols {
            return Err(PercolateError::BufferLength {
                expected: rows * cols,
                actual: cells.len(),
            });
        }
        Ok(Self {
            rows,
            cols,
            cells,
            absorbing: [false; 4],
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }
    pub fn cols(&self) -> usize {
        self.cols
    }
    pub fn length_m(&self) -> usize {
        self.rows - 2
    }
    pub fn length_n(&self) -> usize {
        self.cols - 2
    }

    pub fn cells(&self) -> &[u32] {
        &self.cells
    }

    pub fn into_cells(self) -> Vec<u32> {
        self.cells
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> u32 {
        self.cells[i * self.cols + j]
    }

    #[inline]
    pub fn set(&mut self, i: usize, j: usize, v: u32) {
        self.cells[i * self.cols + j] = v;
    }

    /// Zero the halo line on `dir` and forbid further writes to it.
    pub fn mark_absorbing(&mut self, dir: Direction) {
        for k in 0..self.line_len(dir) {
            let (i, j) = self.halo_cell(dir, k);
            self.set(i, j, 0);
        }
        self.absorbing[dir.index() as usize] = true;
    }

    pub fn is_absorbing(&self, dir: Direction) -> bool {
        self.absorbing[dir.index() as usize]
    }

    /// Copy absorbing marks from `other` (same shape).
    pub fn inherit_absorbing(&mut self, other: &Block) {
        self.absorbing = other.absorbing;
    }

    fn line_len(&self, dir: Direction) -> usize {
        match dir {
            Direction::Up | Direction::Down => self.rows,
            Direction::Left | Direction::Right => self.cols,
        }
    }

    // k-th cell of the boundary-adjacent interior line on `dir`
    fn boundary_cell(&self, dir: Direction, k: usize) -> (usize, usize) {
        match dir {
            Direction::Up => (k, 1),
            Direction::Down => (k, self.cols - 2),
            Direction::Left => (1, k),
            Direction::Right => (self.rows - 2, k),
        }
    }

    // k-th cell of the halo line on `dir`
    fn halo_cell(&self, dir: Direction, k: usize) -> (usize, usize) {
        match dir {
            Direction::Up => (k, 0),
            Direction::Down => (k, self.cols - 1),
            Direction::Left => (0, k),
            Direction::Right => (self.rows - 1, k),
        }
    }

    /// Boundary line on side `dir`, ready to send to the neighbour there.
    pub fn extract_edge(&self, dir: Direction) -> Vec<u32> {
        (0..self.line_len(dir))
            .map(|k| {
                let (i, j) = self.boundary_cell(dir, k);
                self.get(i, j)
            })
            .collect()
    }

    /// Overwrite the halo line on side `dir` with `edge`.
    pub fn inject_edge(&mut self, dir: Direction, edge: &[u32]) -> Result<(), PercolateError> {
        let expected = self.line_len(dir);
        if edge.len() != expected {
            return Err(PercolateError::BufferLength {
                expected,
                actual: edge.len(),
            });
        }
        if self.is_absorbing(dir) {
            return Err(PercolateError::AbsorbingEdge(format!(
                "{dir:?} halo is at the grid boundary"
            )));
        }
        for (k, &v) in edge.iter().enumerate() {
            let (i, j) = self.halo_cell(dir, k);
            self.set(i, j, v);
        }
        Ok(())
    }

    /// Sum of interior labels.
    pub fn interior_sum(&self) -> u64 {
        (1..=self.length_m())
            .flat_map(|i| (1..=self.length_n()).map(move |j| (i, j)))
            .map(|(i, j)| u64::from(self.get(i, j)))
            .sum()
    }
}

impl DebugInvariants for Block {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "Block");
    }

    fn validate_invariants(&self) -> Result<(), PercolateError> {
        if self.cells.len() != self.rows * self.cols {
            return Err(PercolateError::BufferLength {
                expected: self.rows * self.cols,
                actual: self.cells.len(),
            });
        }
        for dir in Direction::ALL {
            if self.is_absorbing(dir) {
                let line: Vec<u32> = (0..self.line_len(dir))
                    .map(|k| {
                        let (i, j) = self.halo_cell(dir, k);
                        self.get(i, j)
                    })
                    .collect();
                ensure_zero_line(&line, &format!("{dir:?} halo"))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered(decomp: &Decomposition) -> Block {
        let n = decomp.block_len() as u32;
        Block::from_cells(decomp, (1..=n).collect()).unwrap()
    }

    #[test]
    fn from_cells_checks_length() {
        let d = Decomposition::new(4, 1, 2).unwrap();
        assert!(matches!(
            Block::from_cells(&d, vec![0; 3]),
            Err(PercolateError::BufferLength { expected: 24, actual: 3 })
        ));
    }

    #[test]
    fn edges_read_interior_lines() {
        // 6 x 4 block: rows 0..6 along m, cols 0..4 along n
        let d = Decomposition::new(4, 1, 2).unwrap();
        let b = numbered(&d);
        assert_eq!(b.extract_edge(Direction::Up), vec![2, 6, 10, 14, 18, 22]);
        assert_eq!(b.extract_edge(Direction::Down), vec![3, 7, 11, 15, 19, 23]);
        assert_eq!(b.extract_edge(Direction::Left), vec![5, 6, 7, 8]);
        assert_eq!(b.extract_edge(Direction::Right), vec![17, 18, 19, 20]);
    }

    #[test]
    fn send_receive_pair_matches_boundary() {
        let d = Decomposition::new(4, 1, 2).unwrap();
        let upper = numbered(&d);
        let mut lower = Block::zeroed(&d);
        let edge = upper.extract_edge(Direction::Down);
        lower.inject_edge(Direction::Up, &edge).unwrap();
        for i in 0..lower.rows() {
            assert_eq!(lower.get(i, 0), upper.get(i, upper.cols() - 2));
        }
    }

    #[test]
    fn absorbing_halo_refuses_writes() {
        let d = Decomposition::new(4, 1, 2).unwrap();
        let mut b = numbered(&d);
        b.mark_absorbing(Direction::Up);
        assert!(b.extract_edge(Direction::Up).iter().all(|&v| v != 0));
        assert!(b.validate_invariants().is_ok());
        let err = b.inject_edge(Direction::Up, &[1; 6]).unwrap_err();
        assert!(matches!(err, PercolateError::AbsorbingEdge(_)));
        b.set(3, 0, 9);
        assert!(b.validate_invariants().is_err());
    }

    #[test]
    fn inject_checks_length() {
        let d = Decomposition::new(4, 1, 2).unwrap();
        let mut b = Block::zeroed(&d);
        assert!(b.inject_edge(Direction::Left, &[1, 2]).is_err());
    }

    #[test]
    fn interior_sum_skips_halo() {
        let d = Decomposition::new(2, 1, 1).unwrap();
        let mut b = Block::zeroed(&d);
        b.set(0, 0, 100);
        b.set(1, 1, 3);
        b.set(2, 2, 4);
        assert_eq!(b.interior_sum(), 7);
    }
}
