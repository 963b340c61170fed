//! Communication backends and the per-iteration algorithms built on them.

pub mod communicator;
pub mod convergence;
pub mod halo;
pub mod percolation;
pub mod relax;
pub mod wire;

pub use convergence::ConvergenceDetector;
pub use percolation::percolates;
pub use relax::relax;
