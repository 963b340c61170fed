//! The coordinator (rank 0): owns the global grid, never relaxes cells.
//!
//! `Seed → Scatter → Poll → Gather → Verdict → Visualize → Done`

use crate::algs::communicator::{Communicator, Wait};
use crate::algs::convergence::{ConvergenceDetector, Outcome, Progress};
use crate::algs::percolation::spanning_labels;
use crate::algs::wire::{WireKind, decode_labels, encode_labels, message_len};
use crate::config::PercolationConfig;
use crate::debug_invariants::DebugInvariants;
use crate::grid::block::Block;
use crate::grid::decomposition::{COORDINATOR, Decomposition};
use crate::grid::global::GlobalGrid;
use crate::io::pgm::{ClusterSummary, write_pgm_file};
use crate::percolate_error::PercolateError;
use crate::run::RunReport;
use crate::run::worker::{GATHER_TAG, SCATTER_TAG};
use std::time::Instant;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Phase {
    Seed,
    Scatter,
    Poll,
    Gather,
    Verdict,
    Visualize,
    Done,
}

pub struct Coordinator<'a, C: Communicator> {
    config: &'a PercolationConfig,
    decomp: Decomposition,
    detector: ConvergenceDetector,
    comm: &'a C,
    phase: Phase,
}

impl<'a, C: Communicator> Coordinator<'a, C> {
    /// Validate `config` against the communicator before any work starts.
    pub fn new(config: &'a PercolationConfig, comm: &'a C) -> Result<Self, PercolateError> {
        let decomp = config.validate()?;
        if comm.size() != decomp.participant_count() {
            return Err(PercolateError::WorkerCount {
                expected: decomp.participant_count(),
                actual: comm.size(),
            });
        }
        if comm.rank() != COORDINATOR {
            return Err(PercolateError::InvalidConfig(format!(
                "coordinator must run on rank {COORDINATOR}, not {}",
                comm.rank()
            )));
        }
        Ok(Self {
            config,
            decomp,
            detector: config.detector()?,
            comm,
            phase: Phase::Seed,
        })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn decomposition(&self) -> &Decomposition {
        &self.decomp
    }

    fn enter(&mut self, phase: Phase) {
        log::debug!("coordinator: {:?} -> {:?}", self.phase, phase);
        self.phase = phase;
    }

    /// Draw the medium from `seed`.
    pub fn seed(&mut self, seed: u64) -> GlobalGrid {
        let l = self.config.grid_size;
        log::info!(
            "percolate: params are L = {l}, rho = {}, seed = {seed}",
            self.config.rho
        );
        let grid = GlobalGrid::seeded(l, self.config.rho, seed);
        log::info!(
            "percolate: rho = {}, actual density = {:.6}",
            self.config.rho,
            grid.density()
        );
        grid
    }

    /// Send every worker its block, in rank order.
    pub fn scatter(&mut self, grid: &GlobalGrid) -> Result<(), PercolateError> {
        self.enter(Phase::Scatter);
        grid.debug_assert_invariants();
        for rank in 1..=self.decomp.worker_count() {
            let block = grid.extract_block(&self.decomp, rank)?;
            let msg = encode_labels(WireKind::Scatter, block.cells());
            let _ = self.comm.isend(rank, SCATTER_TAG.as_u16(), &msg).wait();
        }
        Ok(())
    }

    /// Take part in every reduction until the workers stop.
    pub fn poll(&mut self) -> Result<Outcome, PercolateError> {
        self.enter(Phase::Poll);
        let cells = (self.decomp.grid_size() * self.decomp.grid_size()) as f64;
        let outcome = self.detector.drive(
            self.comm,
            |_| Ok(Progress::default()),
            |step, total| {
                log::info!("step {step}: {} changes, mean label {:.3}", total.changes, total.label_sum as f64 / cells);
            },
        )?;
        if !outcome.converged {
            log::warn!(
                "percolate: max steps = {} reached before changes reached 0; verdict may be incomplete",
                self.detector.max_steps()
            );
        }
        Ok(outcome)
    }

    /// Receive every worker's final block, in rank order, into `grid`.
    pub fn gather(&mut self, grid: &mut GlobalGrid) -> Result<(), PercolateError> {
        self.enter(Phase::Gather);
        let len = self.decomp.block_len();
        for rank in 1..=self.decomp.worker_count() {
            let mut buf = vec![0u8; message_len(len)];
            let bytes = self
                .comm
                .irecv(rank, GATHER_TAG.as_u16(), &mut buf)
                .wait()
                .ok_or_else(|| PercolateError::CommError {
                    neighbor: rank,
                    message: "final block never arrived".into(),
                })?;
            let cells = decode_labels(WireKind::Gather, &bytes, len)?;
            let block = Block::from_cells(&self.decomp, cells)?;
            grid.inject_block(&self.decomp, &block, rank)?;
        }
        grid.debug_assert_invariants();
        Ok(())
    }

    /// Labels spanning both non-periodic edges.
    pub fn verdict(&mut self, grid: &GlobalGrid) -> Vec<u32> {
        self.enter(Phase::Verdict);
        let spanning = spanning_labels(grid);
        if spanning.is_empty() {
            log::info!("percolate: cluster DOES NOT percolate");
        } else {
            log::info!("percolate: cluster DOES percolate");
        }
        spanning
    }

    /// Render the map if an output path is configured.
    pub fn visualize(&mut self, grid: &GlobalGrid) -> Result<Option<ClusterSummary>, PercolateError> {
        self.enter(Phase::Visualize);
        match &self.config.output {
            Some(path) => Ok(Some(write_pgm_file(path, grid, self.config.highlight_clusters)?)),
            None => Ok(None),
        }
    }

    /// Whole run from a seed.
    pub fn run(mut self, seed: u64) -> Result<RunReport, PercolateError> {
        let grid = self.seed(seed);
        let mut report = self.run_with_grid(grid)?;
        report.seed = Some(seed);
        Ok(report)
    }

    /// Whole run on a prepared grid (skips `Seed`).
    pub fn run_with_grid(mut self, mut grid: GlobalGrid) -> Result<RunReport, PercolateError> {
        if grid.size() != self.decomp.grid_size() {
            return Err(PercolateError::InvalidConfig(format!(
                "grid has L = {}, configuration says {}",
                grid.size(),
                self.decomp.grid_size()
            )));
        }
        let density = grid.density();
        let open_cells = grid.open_cells();

        let start = Instant::now();
        self.scatter(&grid)?;
        let outcome = self.poll()?;
        self.gather(&mut grid)?;
        let elapsed = start.elapsed();
        log::info!("elapsed time is {:.6} s", elapsed.as_secs_f64());

        let spanning = self.verdict(&grid);
        let clusters = self.visualize(&grid)?;
        self.enter(Phase::Done);

        Ok(RunReport {
            seed: None,
            grid_size: grid.size(),
            density,
            open_cells,
            steps: outcome.steps,
            converged: outcome.converged,
            percolates: !spanning.is_empty(),
            spanning_labels: spanning,
            elapsed,
            clusters,
            grid,
        })
    }
}
