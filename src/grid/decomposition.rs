//! Block decomposition and coordinate mapping.
//!
//! Ranks are 1-based for workers; rank 0 is the coordinator and owns no
//! block. The m axis (first index) is periodic, the n axis (second index)
//! is not. Scatter and gather both go through [`Decomposition::block_of`]
//! and [`Decomposition::global_origin`], so the two directions always agree.

use crate::percolate_error::PercolateError;
use serde::{Deserialize, Serialize};

/// Rank of the coordinator.
pub const COORDINATOR: usize = 0;

/// Side of a block, named after the neighbour that lies there.
///
/// `Up`/`Down` step along the n axis, `Left`/`Right` along the m axis.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    pub fn opposite(self) -> Self {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }

    /// Stable small index, used for message tags.
    pub fn index(self) -> u16 {
        match self {
            Direction::Up => 0,
            Direction::Down => 1,
            Direction::Left => 2,
            Direction::Right => 3,
        }
    }

    /// `true` for directions across the periodic m axis.
    pub fn is_wrap_axis(self) -> bool {
        matches!(self, Direction::Left | Direction::Right)
    }
}

/// Static partition of an `L × L` grid into `m_parts × n_parts` blocks.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decomposition {
    grid_size: usize,
    m_parts: usize,
    n_parts: usize,
    length_m: usize,
    length_n: usize,
}

impl Decomposition {
    /// Build a decomposition, rejecting empty or non-divisible partitions.
    pub fn new(grid_size: usize, m_parts: usize, n_parts: usize) -> Result<Self, PercolateError> {
        if grid_size == 0 {
            return Err(PercolateError::InvalidConfig(
                "grid size must be positive".into(),
            ));
        }
        for (parts, axis) in [(m_parts, "m"), (n_parts, "n")] {
            if parts == 0 || grid_size % parts != 0 {
                return Err(PercolateError::IndivisibleGrid {
                    grid_size,
                    parts,
                    axis,
                });
            }
        }
        Ok(Self {
            grid_size,
            m_parts,
            n_parts,
            length_m: grid_size / m_parts,
            length_n: grid_size / n_parts,
        })
    }

    pub fn grid_size(&self) -> usize {
        self.grid_size
    }
    pub fn m_parts(&self) -> usize {
        self.m_parts
    }
    pub fn n_parts(&self) -> usize {
        self.n_parts
    }
    /// Interior rows of every block.
    pub fn length_m(&self) -> usize {
        self.length_m
    }
    /// Interior columns of every block.
    pub fn length_n(&self) -> usize {
        self.length_n
    }

    pub fn worker_count(&self) -> usize {
        self.m_parts * self.n_parts
    }

    /// Workers plus the coordinator.
    pub fn participant_count(&self) -> usize {
        self.worker_count() + 1
    }

    /// Block shape including the halo: `(length_m + 2, length_n + 2)`.
    pub fn block_shape(&self) -> (usize, usize) {
        (self.length_m + 2, self.length_n + 2)
    }

    pub fn block_len(&self) -> usize {
        let (r, c) = self.block_shape();
        r * c
    }

    /// Length of the halo line on side `dir`.
    pub fn edge_len(&self, dir: Direction) -> usize {
        match dir {
            Direction::Up | Direction::Down => self.length_m + 2,
            Direction::Left | Direction::Right => self.length_n + 2,
        }
    }

    pub fn is_worker(&self, rank: usize) -> bool {
        (1..=self.worker_count()).contains(&rank)
    }

    /// `(m_index, n_index)` of the block owned by worker `rank`.
    pub fn block_of(&self, rank: usize) -> Result<(usize, usize), PercolateError> {
        if !self.is_worker(rank) {
            return Err(PercolateError::NotAWorker {
                rank,
                workers: self.worker_count(),
            });
        }
        let w = rank - 1;
        Ok((w % self.m_parts, w / self.m_parts))
    }

    /// Worker rank owning block `(m_index, n_index)`.
    pub fn rank_of(&self, m_index: usize, n_index: usize) -> usize {
        n_index * self.m_parts + m_index + 1
    }

    /// Halo corner of block `(m_index, n_index)` in padded global coordinates.
    pub fn global_origin(&self, m_index: usize, n_index: usize) -> (usize, usize) {
        (m_index * self.length_m, n_index * self.length_n)
    }

    /// Rank of the block adjacent to `rank` on side `dir`.
    ///
    /// The n axis ends at the grid boundary (`None`). The m axis wraps; with a
    /// single block along m the neighbour is the block itself.
    pub fn neighbour(&self, rank: usize, dir: Direction) -> Result<Option<usize>, PercolateError> {
        let (m, n) = self.block_of(rank)?;
        let at = match dir {
            Direction::Up => n.checked_sub(1).map(|n| (m, n)),
            Direction::Down => Some(n + 1).filter(|&n| n < self.n_parts).map(|n| (m, n)),
            Direction::Left => Some(((m + self.m_parts - 1) % self.m_parts, n)),
            Direction::Right => Some(((m + 1) % self.m_parts, n)),
        };
        Ok(at.map(|(m, n)| self.rank_of(m, n)))
    }
}
