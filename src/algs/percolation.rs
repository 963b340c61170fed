//! Percolation predicate on a relaxed grid.
//!
//! The medium percolates when one label occurs on both non-periodic edges,
//! i.e. on the `n = L - 1` edge and on the `n = 0` edge. The m axis wraps
//! and is never the spanning axis.

use crate::grid::global::GlobalGrid;
use hashbrown::HashSet;
use itertools::Itertools;

/// Positive labels present on both the `n = L - 1` and `n = 0` edges, ascending.
pub fn spanning_labels(grid: &GlobalGrid) -> Vec<u32> {
    let l = grid.size();
    if l == 0 {
        return Vec::new();
    }
    let bottom: HashSet<u32> = (0..l).map(|i| grid.get(i, 0)).filter(|&v| v > 0).collect();
    (0..l)
        .map(|i| grid.get(i, l - 1))
        .filter(|v| *v > 0 && bottom.contains(v))
        .sorted_unstable()
        .dedup()
        .collect()
}

/// `true` iff some cluster touches both non-periodic edges.
pub fn percolates(grid: &GlobalGrid) -> bool {
    !spanning_labels(grid).is_empty()
}
