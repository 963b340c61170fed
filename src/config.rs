//! Run configuration.
//!
//! Defaults are the reference setup: `L = 288`, `rho = 0.411`, one block
//! along m and three along n, at most 20000 iterations, convergence checked
//! every 100.

use crate::algs::convergence::ConvergenceDetector;
use crate::grid::decomposition::Decomposition;
use crate::percolate_error::PercolateError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PercolationConfig {
    /// Side `L` of the square medium.
    pub grid_size: usize,
    /// Probability that a cell is blocked.
    pub rho: f64,
    /// Blocks along the periodic m axis.
    pub m_parts: usize,
    /// Blocks along the non-periodic n axis.
    pub n_parts: usize,
    /// Iteration cap.
    pub max_steps: usize,
    /// Reduce change counts every `check_interval` iterations.
    pub check_interval: usize,
    /// Cluster sizes shaded in the rendered map.
    pub highlight_clusters: usize,
    /// Where to write the PGM map; `None` skips rendering.
    pub output: Option<PathBuf>,
}

impl Default for PercolationConfig {
    fn default() -> Self {
        Self {
            grid_size: 288,
            rho: 0.411,
            m_parts: 1,
            n_parts: 3,
            max_steps: 20000,
            check_interval: 100,
            highlight_clusters: 3,
            output: Some(PathBuf::from("map.pgm")),
        }
    }
}

impl PercolationConfig {
    /// Small in-memory config, no output file, checked every iteration.
    ///
    /// No label travels further than `L²` cells, so the cap is never what
    /// ends the run.
    pub fn small(grid_size: usize, m_parts: usize, n_parts: usize) -> Self {
        Self {
            grid_size,
            m_parts,
            n_parts,
            max_steps: grid_size * grid_size + 1,
            check_interval: 1,
            output: None,
            ..Self::default()
        }
    }

    /// Read a JSON config; missing fields take their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, PercolateError> {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|e| PercolateError::InvalidConfig(e.to_string()))
    }

    /// Check every field and build the decomposition.
    pub fn validate(&self) -> Result<Decomposition, PercolateError> {
        if !(0.0..=1.0).contains(&self.rho) {
            return Err(PercolateError::InvalidConfig(format!(
                "rho must lie in [0, 1], got {}",
                self.rho
            )));
        }
        if self.highlight_clusters == 0 {
            return Err(PercolateError::InvalidConfig(
                "at least one cluster must be highlighted".into(),
            ));
        }
        if self.grid_size > u32::MAX as usize / self.grid_size.max(1) {
            return Err(PercolateError::InvalidConfig(format!(
                "grid size {} does not fit u32 labels",
                self.grid_size
            )));
        }
        self.detector()?;
        Decomposition::new(self.grid_size, self.m_parts, self.n_parts)
    }

    pub fn detector(&self) -> Result<ConvergenceDetector, PercolateError> {
        ConvergenceDetector::new(self.check_interval, self.max_steps)
    }
}
