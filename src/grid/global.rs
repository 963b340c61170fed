//! The full `L × L` label grid held by the coordinator.
//!
//! Storage is padded with a one-cell zero frame, so the grid is
//! `(L + 2) × (L + 2)` and cell `(i, j)` of the medium lives at padded
//! `(i + 1, j + 1)`. Scatter copies a block *with* its halo straight out of
//! the padded array; gather writes back the interior only.

use crate::debug_invariants::{DebugInvariants, ensure_zero_line};
use crate::grid::block::Block;
use crate::grid::decomposition::Decomposition;
use crate::percolate_error::PercolateError;
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::SmallRng;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GlobalGrid {
    size: usize,
    padded: Vec<u32>,
}

impl GlobalGrid {
    /// Draw a medium: each cell is blocked with probability `rho`, otherwise
    /// it gets the next free label (1, 2, ...) in row-major order.
    pub fn seed<R: Rng + ?Sized>(size: usize, rho: f64, rng: &mut R) -> Self {
        let mut grid = Self::blocked(size);
        let mut open = 0u32;
        for i in 0..size {
            for j in 0..size {
                let r: f64 = rng.r#gen();
                if r >= rho {
                    open += 1;
                    grid.set(i, j, open);
                }
            }
        }
        grid
    }

    /// [`GlobalGrid::seed`] with a `SmallRng` seeded from `seed`.
    pub fn seeded(size: usize, rho: f64, seed: u64) -> Self {
        let mut rng = SmallRng::seed_from_u64(seed);
        Self::seed(size, rho, &mut rng)
    }

    /// Fully blocked grid.
    pub fn blocked(size: usize) -> Self {
        Self {
            size,
            padded: vec![0; (size + 2) * (size + 2)],
        }
    }

    /// Grid from `size × size` unpadded row-major labels.
    pub fn from_labels(size: usize, labels: &[u32]) -> Result<Self, PercolateError> {
        if labels.len() != size * size {
            return Err(PercolateError::BufferLength {
                expected: size * size,
                actual: labels.len(),
            });
        }
        let mut grid = Self::blocked(size);
        for (k, &v) in labels.iter().enumerate() {
            grid.set(k / size, k % size, v);
        }
        Ok(grid)
    }

    pub fn size(&self) -> usize {
        self.size
    }

    fn stride(&self) -> usize {
        self.size + 2
    }

    /// Label of medium cell `(i, j)`.
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> u32 {
        self.padded[(i + 1) * self.stride() + j + 1]
    }

    #[inline]
    pub fn set(&mut self, i: usize, j: usize, v: u32) {
        let s = self.stride();
        self.padded[(i + 1) * s + j + 1] = v;
    }

    /// Unpadded `size × size` labels, row-major.
    pub fn labels(&self) -> Vec<u32> {
        (0..self.size)
            .flat_map(|i| (0..self.size).map(move |j| (i, j)))
            .map(|(i, j)| self.get(i, j))
            .collect()
    }

    pub fn open_cells(&self) -> usize {
        self.padded.iter().filter(|&&v| v != 0).count()
    }

    /// Fraction of blocked cells actually drawn.
    pub fn density(&self) -> f64 {
        let total = (self.size * self.size) as f64;
        if total == 0.0 {
            return 0.0;
        }
        1.0 - self.open_cells() as f64 / total
    }

    /// Copy block `rank` with its halo out of the padded grid.
    pub fn extract_block(&self, decomp: &Decomposition, rank: usize) -> Result<Block, PercolateError> {
        self.check_decomposition(decomp)?;
        let (m, n) = decomp.block_of(rank)?;
        let (m0, n0) = decomp.global_origin(m, n);
        let (rows, cols) = decomp.block_shape();
        let s = self.stride();
        let mut cells = Vec::with_capacity(rows * cols);
        for i in m0..m0 + rows {
            cells.extend_from_slice(&self.padded[i * s + n0..i * s + n0 + cols]);
        }
        Block::from_cells(decomp, cells)
    }

    /// Write the interior of `block` back as block `rank`. Halo cells are
    /// exchange artefacts and are dropped.
    pub fn inject_block(
        &mut self,
        decomp: &Decomposition,
        block: &Block,
        rank: usize,
    ) -> Result<(), PercolateError> {
        self.check_decomposition(decomp)?;
        let (rows, cols) = decomp.block_shape();
        if block.rows() != rows || block.cols() != cols {
            return Err(PercolateError::BufferLength {
                expected: rows * cols,
                actual: block.rows() * block.cols(),
            });
        }
        let (m, n) = decomp.block_of(rank)?;
        let (m0, n0) = decomp.global_origin(m, n);
        let s = self.stride();
        for i in 1..rows - 1 {
            let dst = (m0 + i) * s + n0 + 1;
            let src = i * cols + 1;
            self.padded[dst..dst + cols - 2].copy_from_slice(&block.cells()[src..src + cols - 2]);
        }
        Ok(())
    }

    fn check_decomposition(&self, decomp: &Decomposition) -> Result<(), PercolateError> {
        if decomp.grid_size() != self.size {
            return Err(PercolateError::InvalidConfig(format!(
                "decomposition is for L = {}, grid has L = {}",
                decomp.grid_size(),
                self.size
            )));
        }
        Ok(())
    }
}

impl DebugInvariants for GlobalGrid {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "GlobalGrid");
    }

    fn validate_invariants(&self) -> Result<(), PercolateError> {
        let s = self.stride();
        if self.padded.len() != s * s {
            return Err(PercolateError::BufferLength {
                expected: s * s,
                actual: self.padded.len(),
            });
        }
        ensure_zero_line(&self.padded[..s], "top frame")?;
        ensure_zero_line(&self.padded[(s - 1) * s..], "bottom frame")?;
        let left: Vec<u32> = (0..s).map(|i| self.padded[i * s]).collect();
        let right: Vec<u32> = (0..s).map(|i| self.padded[i * s + s - 1]).collect();
        ensure_zero_line(&left, "left frame")?;
        ensure_zero_line(&right, "right frame")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_medium_is_numbered_row_major() {
        let g = GlobalGrid::seeded(3, 0.0, 1);
        assert_eq!(g.labels(), (1..=9).collect::<Vec<u32>>());
        assert_eq!(g.open_cells(), 9);
        assert_eq!(g.density(), 0.0);
    }

    #[test]
    fn blocked_medium_is_all_zero() {
        let g = GlobalGrid::seeded(5, 1.0, 7);
        assert!(g.labels().iter().all(|&v| v == 0));
        assert_eq!(g.density(), 1.0);
    }

    #[test]
    fn seeding_is_deterministic_and_labels_are_unique() {
        let a = GlobalGrid::seeded(16, 0.4, 1234);
        let b = GlobalGrid::seeded(16, 0.4, 1234);
        assert_eq!(a, b);
        let mut open: Vec<u32> = a.labels().into_iter().filter(|&v| v != 0).collect();
        let n = open.len() as u32;
        open.sort_unstable();
        assert_eq!(open, (1..=n).collect::<Vec<_>>());
        assert!(a.validate_invariants().is_ok());
    }

    #[test]
    fn extract_includes_neighbour_cells_as_halo() {
        let d = Decomposition::new(4, 1, 2).unwrap();
        let g = GlobalGrid::from_labels(4, &(1..=16).collect::<Vec<_>>()).unwrap();
        let b = g.extract_block(&d, 2).unwrap();
        // block 2 covers columns 2..4; its Up halo is column 1 of the grid
        assert_eq!(b.get(1, 0), g.get(0, 1));
        assert_eq!(b.get(1, 1), g.get(0, 2));
        assert_eq!(b.get(4, 2), g.get(3, 3));
        // Down halo is the zero frame
        assert!((0..6).all(|i| b.get(i, 3) == 0));
    }

    #[test]
    fn scatter_then_gather_reproduces_grid() {
        let d = Decomposition::new(12, 2, 3).unwrap();
        let g = GlobalGrid::seeded(12, 0.3, 99);
        let mut out = GlobalGrid::blocked(12);
        for rank in 1..=d.worker_count() {
            let b = g.extract_block(&d, rank).unwrap();
            out.inject_block(&d, &b, rank).unwrap();
        }
        assert_eq!(out, g);
    }

    #[test]
    fn gather_ignores_halo() {
        let d = Decomposition::new(4, 1, 2).unwrap();
        let mut g = GlobalGrid::blocked(4);
        let mut b = Block::zeroed(&d);
        b.set(0, 1, 77);
        b.set(2, 2, 5);
        g.inject_block(&d, &b, 1).unwrap();
        assert_eq!(g.get(1, 1), 5);
        assert_eq!(g.open_cells(), 1);
        assert!(g.validate_invariants().is_ok());
    }

    #[test]
    fn decomposition_must_match_grid() {
        let d = Decomposition::new(8, 1, 2).unwrap();
        let g = GlobalGrid::blocked(4);
        assert!(g.extract_block(&d, 1).is_err());
    }
}
