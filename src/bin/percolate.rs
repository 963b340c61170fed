//! Command-line driver.
//!
//! ```bash
//! # 288 x 288 medium, 1 x 3 blocks on threads, map written to map.pgm
//! cargo run --release --bin percolate -- 1564
//!
//! # smaller medium, 2 x 2 blocks, no map
//! cargo run --release --bin percolate -- 42 --grid-size 64 --m-parts 2 --n-parts 2 --no-output
//!
//! # under MPI (mP * nP + 1 ranks)
//! mpirun -n 4 target/release/percolate 1564 --mpi
//! ```

use clap::Parser;
use env_logger::Env;
use percolate::config::PercolationConfig;
use percolate::percolate_error::PercolateError;
use percolate::run::{RunReport, run_threaded};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "percolate")]
#[command(about = "Distributed site percolation on a square lattice")]
struct Args {
    /// Seed for the random medium
    seed: u64,

    /// JSON configuration; flags below override it
    #[arg(long, env = "PERCOLATE_CONFIG")]
    config: Option<PathBuf>,

    /// Side L of the medium
    #[arg(long)]
    grid_size: Option<usize>,

    /// Probability that a cell is blocked
    #[arg(long)]
    rho: Option<f64>,

    /// Blocks along the periodic axis
    #[arg(long)]
    m_parts: Option<usize>,

    /// Blocks along the spanning axis
    #[arg(long)]
    n_parts: Option<usize>,

    /// Iteration cap
    #[arg(long)]
    max_steps: Option<usize>,

    /// Iterations between convergence checks
    #[arg(long)]
    check_interval: Option<usize>,

    /// Number of cluster sizes to shade in the map
    #[arg(long)]
    clusters: Option<usize>,

    /// PGM output path
    #[arg(long, conflicts_with = "no_output")]
    output: Option<PathBuf>,

    /// Skip writing the map
    #[arg(long)]
    no_output: bool,

    /// Run the local rank's role under MPI instead of threads
    #[cfg(feature = "mpi-support")]
    #[arg(long)]
    mpi: bool,

    /// Print the run report as JSON on stdout
    #[arg(long)]
    json: bool,
}

impl Args {
    fn config(&self) -> Result<PercolationConfig, PercolateError> {
        let mut config = match &self.config {
            Some(path) => PercolationConfig::from_json_file(path)?,
            None => PercolationConfig::default(),
        };
        if let Some(v) = self.grid_size {
            config.grid_size = v;
        }
        if let Some(v) = self.rho {
            config.rho = v;
        }
        if let Some(v) = self.m_parts {
            config.m_parts = v;
        }
        if let Some(v) = self.n_parts {
            config.n_parts = v;
        }
        if let Some(v) = self.max_steps {
            config.max_steps = v;
        }
        if let Some(v) = self.check_interval {
            config.check_interval = v;
        }
        if let Some(v) = self.clusters {
            config.highlight_clusters = v;
        }
        if let Some(v) = &self.output {
            config.output = Some(v.clone());
        }
        if self.no_output {
            config.output = None;
        }
        Ok(config)
    }

    fn run(&self, config: &PercolationConfig) -> Result<Option<RunReport>, PercolateError> {
        #[cfg(feature = "mpi-support")]
        if self.mpi {
            return percolate::run::run_mpi(config, self.seed);
        }
        run_threaded(config, self.seed).map(Some)
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let report = args.config().and_then(|config| args.run(&config));
    match report {
        Ok(Some(report)) => {
            if args.json {
                match serde_json::to_string_pretty(&report) {
                    Ok(text) => println!("{text}"),
                    Err(e) => {
                        log::error!("cannot encode report: {e}");
                        return ExitCode::FAILURE;
                    }
                }
            }
            ExitCode::SUCCESS
        }
        Ok(None) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("percolate: {e}");
            ExitCode::FAILURE
        }
    }
}
