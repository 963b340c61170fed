//! PercolateError: unified error type for the percolation engine.
//!
//! Every fallible public API returns `Result<_, PercolateError>`. Configuration
//! errors are raised before any distributed work starts; communication errors
//! are fatal and never retried.

use thiserror::Error;

/// Unified error type for percolation runs.
#[derive(Debug, Error)]
pub enum PercolateError {
    /// The grid side is not evenly divisible by the number of blocks on an axis.
    #[error("grid size {grid_size} is not divisible by {parts} blocks along the {axis} axis")]
    IndivisibleGrid {
        grid_size: usize,
        parts: usize,
        axis: &'static str,
    },
    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// The number of participants does not match `mP * nP + 1`.
    #[error("wrong number of processes: expected {expected}, got {actual}")]
    WorkerCount { expected: usize, actual: usize },
    /// A rank outside `1..=worker_count` was used as a worker id.
    #[error("rank {rank} is not a worker rank (workers are 1..={workers})")]
    NotAWorker { rank: usize, workers: usize },
    /// A flat buffer did not have the length the decomposition requires.
    #[error("buffer length mismatch: expected {expected} cells, got {actual}")]
    BufferLength { expected: usize, actual: usize },
    /// A message header was malformed or of the wrong kind.
    #[error("wire format error: {0}")]
    Wire(String),
    /// Point-to-point communication with a peer failed.
    #[error("communication error with rank {neighbor}: {message}")]
    CommError { neighbor: usize, message: String },
    /// Participants entered the same collective at different iterations.
    #[error("collective mismatch: rank {rank} reduced at step {step}, others at step {expected}")]
    CollectiveMismatch {
        rank: usize,
        step: usize,
        expected: usize,
    },
    /// Another participant failed and the run was torn down.
    #[error("rank {rank}: run aborted by another participant")]
    Aborted { rank: usize },
    /// A worker thread panicked before returning its block.
    #[error("worker rank {0} panicked")]
    WorkerPanicked(usize),
    /// A halo line that must stay zero was written.
    #[error("absorbing edge violated: {0}")]
    AbsorbingEdge(String),
    /// I/O failure while writing output.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
