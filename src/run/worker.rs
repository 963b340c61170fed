//! A worker owns one block for the whole run.
//!
//! Receive block → (halo exchange, relax, swap) every iteration, reduce on
//! the cadence → send the final block back.

use crate::algs::communicator::{CommTag, Communicator, Wait};
use crate::algs::convergence::{ConvergenceDetector, Outcome, Progress};
use crate::algs::halo::exchange_halos;
use crate::algs::relax::relax;
use crate::algs::wire::{WireKind, decode_labels, encode_labels, message_len};
use crate::debug_invariants::DebugInvariants;
use crate::grid::block::Block;
use crate::grid::decomposition::{COORDINATOR, Decomposition, Direction};
use crate::percolate_error::PercolateError;

/// Coordinator → worker initial block.
pub const SCATTER_TAG: CommTag = CommTag::new(0x0100);
/// Worker → coordinator final block.
pub const GATHER_TAG: CommTag = CommTag::new(0x0200);

pub struct Worker {
    rank: usize,
    decomp: Decomposition,
    old: Block,
    new: Block,
}

impl Worker {
    /// Set up from an initial block: n-axis sides at the grid boundary are
    /// zeroed and made absorbing.
    pub fn new(decomp: Decomposition, rank: usize, mut block: Block) -> Result<Self, PercolateError> {
        for dir in [Direction::Up, Direction::Down] {
            if decomp.neighbour(rank, dir)?.is_none() {
                block.mark_absorbing(dir);
            }
        }
        block.debug_assert_invariants();
        let new = block.clone();
        Ok(Self {
            rank,
            decomp,
            old: block,
            new,
        })
    }

    /// Block the caller until the coordinator's block for this rank arrives.
    pub fn receive<C: Communicator>(comm: &C, decomp: Decomposition) -> Result<Self, PercolateError> {
        let rank = comm.rank();
        decomp.block_of(rank)?;
        let mut buf = vec![0u8; message_len(decomp.block_len())];
        let bytes = comm
            .irecv(COORDINATOR, SCATTER_TAG.as_u16(), &mut buf)
            .wait()
            .ok_or_else(|| PercolateError::CommError {
                neighbor: COORDINATOR,
                message: "initial block never arrived".into(),
            })?;
        let cells = decode_labels(WireKind::Scatter, &bytes, decomp.block_len())?;
        Self::new(decomp, rank, Block::from_cells(&decomp, cells)?)
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Current state, halo included.
    pub fn block(&self) -> &Block {
        &self.old
    }

    /// One iteration: refresh halos, relax into the spare buffer, swap.
    /// Returns the number of changed cells.
    pub fn step<C: Communicator>(&mut self, comm: &C) -> Result<u64, PercolateError> {
        exchange_halos(comm, &self.decomp, &mut self.old)?;
        let changes = relax(&self.old, &mut self.new);
        std::mem::swap(&mut self.old, &mut self.new);
        Ok(changes)
    }

    /// Return the final block to the coordinator.
    pub fn send_back<C: Communicator>(self, comm: &C) -> Result<(), PercolateError> {
        self.old.debug_assert_invariants();
        let msg = encode_labels(WireKind::Gather, self.old.cells());
        let _ = comm.isend(COORDINATOR, GATHER_TAG.as_u16(), &msg).wait();
        Ok(())
    }

    /// Full worker life cycle.
    pub fn run<C: Communicator>(
        comm: &C,
        decomp: Decomposition,
        detector: &ConvergenceDetector,
    ) -> Result<Outcome, PercolateError> {
        let mut worker = Self::receive(comm, decomp)?;
        let rank = worker.rank;
        log::debug!("worker {rank}: block received");
        let outcome = detector.drive(
            comm,
            |step| {
                let changes = worker.step(comm)?;
                let label_sum = if detector.is_check_step(step) {
                    log::debug!("worker {rank}: {changes} changes on step {step}");
                    worker.old.interior_sum()
                } else {
                    0
                };
                Ok(Progress { changes, label_sum })
            },
            |_, _| {},
        )?;
        worker.send_back(comm)?;
        log::debug!("worker {rank}: done after {} steps", outcome.steps);
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::ThreadWorld;
    use crate::grid::global::GlobalGrid;

    #[test]
    fn boundary_sides_become_absorbing() {
        let d = Decomposition::new(4, 1, 2).unwrap();
        let g = GlobalGrid::seeded(4, 0.0, 1);
        let top = Worker::new(d, 1, g.extract_block(&d, 1).unwrap()).unwrap();
        assert!(top.block().is_absorbing(Direction::Up));
        assert!(!top.block().is_absorbing(Direction::Down));
        let bottom = Worker::new(d, 2, g.extract_block(&d, 2).unwrap()).unwrap();
        assert!(bottom.block().is_absorbing(Direction::Down));
        assert!(!bottom.block().is_absorbing(Direction::Left));
    }

    #[test]
    fn single_worker_floods_its_block() {
        let d = Decomposition::new(3, 1, 1).unwrap();
        let g = GlobalGrid::seeded(3, 0.0, 1);
        let world = ThreadWorld::new(2);
        let comm = world.comm(1);
        let mut w = Worker::new(d, 1, g.extract_block(&d, 1).unwrap()).unwrap();
        let mut steps = 0;
        while w.step(&comm).unwrap() != 0 {
            steps += 1;
            assert!(steps < 10);
        }
        for i in 1..=3 {
            for j in 1..=3 {
                assert_eq!(w.block().get(i, j), 9);
            }
        }
    }

    #[test]
    fn receive_rejects_coordinator_rank() {
        let d = Decomposition::new(4, 1, 2).unwrap();
        let world = ThreadWorld::new(3);
        assert!(matches!(
            Worker::receive(&world.comm(0), d),
            Err(PercolateError::NotAWorker { rank: 0, .. })
        ));
    }
}
