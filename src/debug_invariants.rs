//! Invariant checks for grids and blocks.
//!
//! The checks are cheap enough to run after every scatter and gather in debug
//! builds; release builds skip them unless `strict-invariants` or
//! `check-invariants` is enabled.

use crate::percolate_error::PercolateError;

/// Structural invariants of a label buffer.
pub trait DebugInvariants {
    /// Panic on the first violated invariant (debug / checking builds only).
    fn debug_assert_invariants(&self);
    /// Return the first violated invariant as an error.
    fn validate_invariants(&self) -> Result<(), PercolateError>;
}

/// Run a fallible invariant check and panic with context when checking is on.
#[macro_export]
macro_rules! debug_invariants {
    ($expr:expr, $($ctx:tt)*) => {
        #[cfg(any(debug_assertions, feature = "strict-invariants", feature = "check-invariants"))]
        if let Err(e) = $expr {
            panic!(concat!("[invariants] ", $($ctx)*, ": {}"), e);
        }
    };
}

/// Fail unless every value in `line` is zero.
pub(crate) fn ensure_zero_line<'a, I>(line: I, what: &str) -> Result<(), PercolateError>
where
    I: IntoIterator<Item = &'a u32>,
{
    match line.into_iter().position(|&v| v != 0) {
        None => Ok(()),
        Some(at) => Err(PercolateError::AbsorbingEdge(format!(
            "{what} holds a non-zero label at offset {at}"
        ))),
    }
}
