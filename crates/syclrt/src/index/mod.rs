//! Multi-dimensional index spaces.
//!
//! All index values store three slots regardless of their logical dimension count `N`. Slots past
//! `N` hold the neutral value of the type (0 for [`Id`], 1 for [`Range`]) so that linearisation
//! and products work uniformly, and every operator touches only the first `N` slots.

mod array;
#[macro_use]
mod ops;
mod id;
mod nd_range;
mod range;

pub use array::IndexArray;
pub use id::Id;
pub use nd_range::NdRange;
pub use range::Range;

/// Compile-time guard on the dimension parameter.
pub(crate) struct Dims<const N: usize>;

impl<const N: usize> Dims<N> {
    pub(crate) const VALID: () = assert!(N >= 1 && N <= 3, "index spaces have one, two or three dimensions");
}
