//! The medium and how it is cut into blocks.

pub mod block;
pub mod decomposition;
pub mod global;

pub use block::Block;
pub use decomposition::{COORDINATOR, Decomposition, Direction};
pub use global::GlobalGrid;
