//! Algorithms built on the queue: currently the work-group tree reduction.

mod reduce;

pub use reduce::{is_power_of_two, tree_reduce};
