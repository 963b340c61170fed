//! Whole-run drivers: one coordinator plus `mP · nP` workers.
//!
//! [`run_threaded`] puts every participant on its own thread over a
//! [`ThreadWorld`]; [`run_mpi`] runs the local rank's role under MPI.

pub mod coordinator;
pub mod worker;

use crate::algs::communicator::{Communicator, ThreadComm, ThreadWorld};
use crate::config::PercolationConfig;
use crate::grid::global::GlobalGrid;
use crate::io::pgm::ClusterSummary;
use crate::percolate_error::PercolateError;
use coordinator::Coordinator;
use serde::Serialize;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Duration;
use worker::Worker;

/// What the coordinator knows once a run has finished.
#[derive(Clone, Debug, Serialize)]
pub struct RunReport {
    pub seed: Option<u64>,
    pub grid_size: usize,
    /// Fraction of blocked cells in the initial medium.
    pub density: f64,
    pub open_cells: usize,
    pub steps: usize,
    /// `false` when the iteration cap was hit first.
    pub converged: bool,
    pub percolates: bool,
    pub spanning_labels: Vec<u32>,
    pub elapsed: Duration,
    pub clusters: Option<ClusterSummary>,
    /// Final relaxed grid.
    #[serde(skip_serializing)]
    pub grid: GlobalGrid,
}

/// Seed a medium from `seed` and run it on threads.
pub fn run_threaded(config: &PercolationConfig, seed: u64) -> Result<RunReport, PercolateError> {
    run_on_threads(config, |coordinator| coordinator.run(seed))
}

/// Run a prepared medium on threads.
pub fn run_threaded_with_grid(
    config: &PercolationConfig,
    grid: GlobalGrid,
) -> Result<RunReport, PercolateError> {
    run_on_threads(config, move |coordinator| coordinator.run_with_grid(grid))
}

fn run_on_threads<F>(config: &PercolationConfig, drive: F) -> Result<RunReport, PercolateError>
where
    F: FnOnce(Coordinator<'_, ThreadComm>) -> Result<RunReport, PercolateError>,
{
    let decomp = config.validate()?;
    let detector = config.detector()?;
    let world = ThreadWorld::new(decomp.participant_count());
    let mut comms = world.communicators().into_iter();
    let root = comms.next().ok_or(PercolateError::WorkerCount {
        expected: decomp.participant_count(),
        actual: 0,
    })?;

    std::thread::scope(|s| {
        let handles: Vec<_> = comms
            .map(|comm| {
                let world = &world;
                let detector = &detector;
                s.spawn(move || {
                    let rank = comm.rank();
                    let result = catch_unwind(AssertUnwindSafe(|| {
                        Worker::run(&comm, decomp, detector)
                    }));
                    let result = match result {
                        Ok(r) => r,
                        Err(_) => Err(PercolateError::WorkerPanicked(rank)),
                    };
                    if let Err(e) = &result {
                        log::error!("worker {rank}: {e}");
                        world.abort();
                    }
                    result
                })
            })
            .collect();

        let report = Coordinator::new(config, &root).and_then(drive);
        if report.is_err() {
            world.abort();
        }

        let mut worker_err = None;
        for (i, h) in handles.into_iter().enumerate() {
            let outcome = h
                .join()
                .unwrap_or(Err(PercolateError::WorkerPanicked(i + 1)));
            if let Err(e) = outcome {
                let better = !matches!(e, PercolateError::Aborted { .. });
                match &worker_err {
                    None => worker_err = Some(e),
                    Some(PercolateError::Aborted { .. }) if better => worker_err = Some(e),
                    _ => {}
                }
            }
        }

        match (report, worker_err) {
            (Ok(r), None) => Ok(r),
            (Err(e), None) => Err(e),
            (Err(PercolateError::Aborted { .. }), Some(w)) => Err(w),
            (Err(e), Some(_)) => Err(e),
            (Ok(_), Some(w)) => Err(w),
        }
    })
}

/// Run the local rank's role under MPI. Only rank 0 gets a report.
#[cfg(feature = "mpi-support")]
pub fn run_mpi(config: &PercolationConfig, seed: u64) -> Result<Option<RunReport>, PercolateError> {
    use crate::algs::communicator::MpiComm;
    use crate::grid::decomposition::COORDINATOR;

    let comm = MpiComm::new()?;
    let decomp = config.validate()?;
    if comm.size() != decomp.participant_count() {
        return Err(PercolateError::WorkerCount {
            expected: decomp.participant_count(),
            actual: comm.size(),
        });
    }
    if comm.rank() == COORDINATOR {
        Coordinator::new(config, &comm)?.run(seed).map(Some)
    } else {
        Worker::run(&comm, decomp, &config.detector()?)?;
        Ok(None)
    }
}
