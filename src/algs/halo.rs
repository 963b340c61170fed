//! Halo exchange between neighbouring blocks.
//!
//! One iteration runs four shifts, one per [`Direction`]. In the shift for
//! `dir` every worker sends its boundary line on side `dir` to the neighbour
//! there and receives, from the neighbour on the opposite side, the line that
//! neighbour sent the same way; that line lands in the halo on the opposite
//! side. After the four shifts every halo line with a neighbour is current.
//!
//! - The n axis has no neighbour past the grid edge: that side neither sends
//!   nor receives, and its halo stays at the zero it was given at setup.
//! - The m axis wraps. With one block along m the neighbour is the block
//!   itself and the shift is a local copy; otherwise it is a message like any
//!   other.

use crate::algs::communicator::{CommTag, Communicator};
use crate::algs::wire::{WireKind, decode_labels, encode_labels, message_len};
use crate::grid::block::Block;
use crate::grid::decomposition::{Decomposition, Direction};
use crate::percolate_error::PercolateError;

/// Base tag for halo shifts; shift `dir` uses `HALO_TAG.offset(dir.index())`.
pub const HALO_TAG: CommTag = CommTag::new(0x0300);

/// Who a worker talks to in the shift along `dir`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Shift {
    pub dir: Direction,
    /// Receiver of our `dir` boundary line.
    pub send_to: Option<usize>,
    /// Sender of the line that fills our `dir.opposite()` halo.
    pub recv_from: Option<usize>,
}

impl Shift {
    pub fn plan(decomp: &Decomposition, rank: usize, dir: Direction) -> Result<Self, PercolateError> {
        Ok(Self {
            dir,
            send_to: decomp.neighbour(rank, dir)?,
            recv_from: decomp.neighbour(rank, dir.opposite())?,
        })
    }

    fn is_local(&self, rank: usize) -> bool {
        self.send_to == Some(rank) && self.recv_from == Some(rank)
    }
}

/// Run the shift along `dir` and inject the received line.
///
/// Returns `true` when a halo line was written.
pub fn exchange_edge<C: Communicator>(
    comm: &C,
    decomp: &Decomposition,
    block: &mut Block,
    dir: Direction,
) -> Result<bool, PercolateError> {
    let rank = comm.rank();
    let shift = Shift::plan(decomp, rank, dir)?;
    let halo = dir.opposite();

    if shift.is_local(rank) {
        let edge = block.extract_edge(dir);
        block.inject_edge(halo, &edge)?;
        return Ok(true);
    }

    let out = shift
        .send_to
        .map(|_| encode_labels(WireKind::Edge, &block.extract_edge(dir)));
    let recv_len = message_len(decomp.edge_len(halo));
    let tag = HALO_TAG.offset(dir.index()).as_u16();
    let got = comm.exchange(
        tag,
        shift.send_to.zip(out.as_deref()),
        shift.recv_from.map(|peer| (peer, recv_len)),
    )?;

    match got {
        Some(bytes) => {
            let edge = decode_labels(WireKind::Edge, &bytes, decomp.edge_len(halo))?;
            block.inject_edge(halo, &edge)?;
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Refresh every halo line of `block`; returns how many were written.
pub fn exchange_halos<C: Communicator>(
    comm: &C,
    decomp: &Decomposition,
    block: &mut Block,
) -> Result<usize, PercolateError> {
    let mut refreshed = 0;
    for dir in Direction::ALL {
        if exchange_edge(comm, decomp, block, dir)? {
            refreshed += 1;
        }
    }
    Ok(refreshed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::ThreadWorld;
    use crate::grid::global::GlobalGrid;
    use std::thread;

    #[test]
    fn shift_plan_at_grid_edges() {
        let d = Decomposition::new(6, 1, 3).unwrap();
        let s = Shift::plan(&d, 1, Direction::Up).unwrap();
        assert_eq!((s.send_to, s.recv_from), (None, Some(2)));
        let s = Shift::plan(&d, 3, Direction::Up).unwrap();
        assert_eq!((s.send_to, s.recv_from), (Some(2), None));
        let s = Shift::plan(&d, 2, Direction::Left).unwrap();
        assert!(s.is_local(2));
    }

    #[test]
    fn single_block_wrap_is_local_copy() {
        let d = Decomposition::new(3, 1, 1).unwrap();
        let g = GlobalGrid::from_labels(3, &[1, 2, 3, 4, 5, 6, 7, 8, 9]).unwrap();
        let mut b = g.extract_block(&d, 1).unwrap();
        let world = ThreadWorld::new(2);
        let comm = world.comm(1);
        let refreshed = exchange_halos(&comm, &d, &mut b).unwrap();
        assert_eq!(refreshed, 2);
        // halo row 0 mirrors the last interior row, halo row 4 the first
        assert_eq!((b.get(0, 1), b.get(0, 2), b.get(0, 3)), (7, 8, 9));
        assert_eq!((b.get(4, 1), b.get(4, 2), b.get(4, 3)), (1, 2, 3));
        // n-axis halos untouched
        assert!((0..5).all(|i| b.get(i, 0) == 0 && b.get(i, 4) == 0));
    }

    #[test]
    fn neighbouring_blocks_swap_boundaries() {
        let d = Decomposition::new(4, 2, 2).unwrap();
        let g = GlobalGrid::seeded(4, 0.0, 3);
        let world = ThreadWorld::new(d.participant_count());
        let blocks = thread::scope(|s| {
            let hs: Vec<_> = (1..=4)
                .map(|rank| {
                    let comm = world.comm(rank);
                    let mut b = Block::zeroed(&d);
                    // interior only; halos must come from the exchange
                    let src = g.extract_block(&d, rank).unwrap();
                    for i in 1..=2 {
                        for j in 1..=2 {
                            b.set(i, j, src.get(i, j));
                        }
                    }
                    s.spawn(move || {
                        exchange_halos(&comm, &d, &mut b).unwrap();
                        b
                    })
                })
                .collect();
            hs.into_iter().map(|h| h.join().unwrap()).collect::<Vec<_>>()
        });
        let reference: Vec<Block> = (1..=4).map(|r| g.extract_block(&d, r).unwrap()).collect();
        for (k, b) in blocks.iter().enumerate() {
            let rank = k + 1;
            let (m, _) = d.block_of(rank).unwrap();
            let want = &reference[k];
            // Up/Down halos agree with the global array's own padding
            for i in 1..=2 {
                assert_eq!(b.get(i, 0), want.get(i, 0), "rank {rank} up halo row {i}");
                assert_eq!(b.get(i, 3), want.get(i, 3), "rank {rank} down halo row {i}");
            }
            // Left/Right halos wrap around the m axis
            let other = &reference[d.rank_of(1 - m, d.block_of(rank).unwrap().1) - 1];
            for j in 1..=2 {
                assert_eq!(b.get(0, j), other.get(2, j));
                assert_eq!(b.get(3, j), other.get(1, j));
            }
        }
    }
}
