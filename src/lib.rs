#![cfg_attr(docsrs, feature(doc_cfg))]
//! # percolate
//!
//! Distributed site percolation on a square lattice. A coordinator seeds an
//! `L × L` medium, cuts it into `mP × nP` blocks and hands one to each worker.
//! Workers relax their block (every open cell takes the largest label among
//! itself and its four neighbours), swapping edge rows and columns with
//! their neighbours every iteration, until a global sum reduction reports no
//! changes. The coordinator then gathers the blocks and tests whether one
//! cluster spans the non-periodic axis.
//!
//! ## Axes
//!
//! The first grid index `i` runs along the m axis, which is periodic. The
//! second index `j` runs along the n axis, whose ends are absorbing; the
//! percolation test looks for a label on both the `j = 0` and `j = L - 1`
//! edges.
//!
//! ## Backends
//!
//! - [`ThreadWorld`](algs::communicator::ThreadWorld): every participant on its own thread
//! - `MpiComm` (feature `mpi-support`): one participant per MPI rank
//! - [`NoComm`](algs::communicator::NoComm): serial, single participant
//!
//! ## Determinism
//!
//! Media are drawn from a `SmallRng` seeded by the caller, so the same seed
//! gives the same medium and, whatever the block layout, the same final
//! labels.

pub mod algs;
pub mod config;
pub mod debug_invariants;
pub mod grid;
pub mod io;
pub mod percolate_error;
pub mod run;

pub use debug_invariants::DebugInvariants;

/// The most-used types in one import.
pub mod prelude {
    pub use crate::algs::communicator::{Communicator, NoComm, ThreadComm, ThreadWorld};
    #[cfg(feature = "mpi-support")]
    pub use crate::algs::communicator::MpiComm;
    pub use crate::algs::convergence::{ConvergenceDetector, Outcome, Progress};
    pub use crate::algs::percolation::{percolates, spanning_labels};
    pub use crate::config::PercolationConfig;
    pub use crate::grid::{Block, COORDINATOR, Decomposition, Direction, GlobalGrid};
    pub use crate::io::pgm::{ClusterSummary, write_pgm, write_pgm_file};
    pub use crate::percolate_error::PercolateError;
    #[cfg(feature = "mpi-support")]
    pub use crate::run::run_mpi;
    pub use crate::run::{RunReport, run_threaded, run_threaded_with_grid};
}
