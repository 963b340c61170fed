//! Global convergence detection.
//!
//! Every participant runs the same [`ConvergenceDetector::drive`] loop, so
//! every participant reaches the reduction at the same iteration numbers.
//! Workers report their change count and interior label sum; the coordinator
//! reports zeros. The loop stops on the first checked step whose global
//! change count is 0, or after `max_steps` iterations.

use crate::algs::communicator::Communicator;
use crate::percolate_error::PercolateError;
use serde::{Deserialize, Serialize};

/// What one participant contributes to a reduction.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    /// Interior cells whose label changed this iteration.
    pub changes: u64,
    /// Sum of interior labels after this iteration.
    pub label_sum: u64,
}

impl Progress {
    fn to_wire(self) -> [u64; 2] {
        [self.changes, self.label_sum]
    }

    fn from_wire(v: &[u64]) -> Result<Self, PercolateError> {
        match v {
            [changes, label_sum] => Ok(Self {
                changes: *changes,
                label_sum: *label_sum,
            }),
            _ => Err(PercolateError::BufferLength {
                expected: 2,
                actual: v.len(),
            }),
        }
    }
}

/// How a driven loop ended.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    /// Iterations executed.
    pub steps: usize,
    /// `true` iff a reduction saw zero global changes.
    pub converged: bool,
    /// Totals from the last reduction, if any ran.
    pub last: Option<Progress>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvergenceDetector {
    check_interval: usize,
    max_steps: usize,
}

impl ConvergenceDetector {
    pub fn new(check_interval: usize, max_steps: usize) -> Result<Self, PercolateError> {
        if check_interval == 0 {
            return Err(PercolateError::InvalidConfig(
                "convergence check interval must be positive".into(),
            ));
        }
        Ok(Self {
            check_interval,
            max_steps,
        })
    }

    pub fn check_interval(&self) -> usize {
        self.check_interval
    }

    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    pub fn is_check_step(&self, step: usize) -> bool {
        step % self.check_interval == 0
    }

    /// Reduce `local` over every participant at iteration `step`.
    pub fn reduce<C: Communicator>(
        &self,
        comm: &C,
        step: usize,
        local: Progress,
    ) -> Result<Progress, PercolateError> {
        let total = comm.all_reduce_sum(step, &local.to_wire())?;
        Progress::from_wire(&total)
    }

    /// Run `body` for steps `1..=max_steps`, reducing on every check step.
    ///
    /// `body` does this participant's work for one iteration and returns its
    /// local progress. `on_check` sees `(step, global totals)` after each
    /// reduction.
    pub fn drive<C, B, F>(&self, comm: &C, mut body: B, mut on_check: F) -> Result<Outcome, PercolateError>
    where
        C: Communicator,
        B: FnMut(usize) -> Result<Progress, PercolateError>,
        F: FnMut(usize, Progress),
    {
        let mut last = None;
        for step in 1..=self.max_steps {
            let local = body(step)?;
            if self.is_check_step(step) {
                let global = self.reduce(comm, step, local)?;
                on_check(step, global);
                last = Some(global);
                if global.changes == 0 {
                    return Ok(Outcome {
                        steps: step,
                        converged: true,
                        last,
                    });
                }
            }
        }
        Ok(Outcome {
            steps: self.max_steps,
            converged: false,
            last,
        })
    }
}
