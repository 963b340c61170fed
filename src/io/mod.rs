//! Output of relaxed grids.

pub mod pgm;

pub use pgm::{ClusterSummary, write_pgm, write_pgm_file};
