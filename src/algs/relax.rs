//! One label-propagation sweep over a block.
//!
//! Every open interior cell takes the maximum of itself and its four
//! neighbours (halo included). Blocked cells (0) never change. The sweep
//! reads only `old` and writes only the interior of `new`, so traversal order
//! does not matter.

use crate::grid::block::Block;

/// Relax `old` into `new`; returns the number of interior cells that changed.
///
/// Halo cells of `new` are left as they are.
pub fn relax(old: &Block, new: &mut Block) -> u64 {
    debug_assert_eq!((old.rows(), old.cols()), (new.rows(), new.cols()));
    let mut changes = 0;
    for i in 1..=old.length_m() {
        for j in 1..=old.length_n() {
            let oldval = old.get(i, j);
            let mut newval = oldval;
            if oldval != 0 {
                newval = newval
                    .max(old.get(i - 1, j))
                    .max(old.get(i + 1, j))
                    .max(old.get(i, j - 1))
                    .max(old.get(i, j + 1));
                if newval != oldval {
                    changes += 1;
                }
            }
            new.set(i, j, newval);
        }
    }
    changes
}
