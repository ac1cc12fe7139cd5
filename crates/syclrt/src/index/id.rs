use super::{IndexArray, Range};

/// A position inside an index space of `N` dimensions.
#[derive(Clone, Copy)]
pub struct Id<const N: usize> {
    slots: IndexArray,
}

index_value!(Id, 0);

impl<const N: usize> Id<N> {
    pub fn zero() -> Self {
        Self::from_index_array(IndexArray::splat(0))
    }

    /// True when every logical slot is zero.
    pub fn is_zero(&self) -> bool {
        self.to_array().iter().all(|&v| v == 0)
    }

    /// Row-major linear position inside `range`, the last logical dimension varying fastest.
    pub fn linearize(&self, range: &Range<N>) -> usize {
        self.slots.linearize(&range.as_index_array())
    }
}

impl<const N: usize> Default for Id<N> {
    fn default() -> Self {
        Self::zero()
    }
}

impl<const N: usize> From<Range<N>> for Id<N> {
    fn from(range: Range<N>) -> Self {
        Self::from_index_array(range.as_index_array())
    }
}

impl<const N: usize> std::ops::Add<Range<N>> for Id<N> {
    type Output = Id<N>;

    fn add(self, rhs: Range<N>) -> Id<N> {
        self + Id::from(rhs)
    }
}

impl<const N: usize> std::ops::Mul<Range<N>> for Id<N> {
    type Output = Id<N>;

    fn mul(self, rhs: Range<N>) -> Id<N> {
        self * Id::from(rhs)
    }
}

impl<const N: usize> std::ops::Rem<Range<N>> for Id<N> {
    type Output = Id<N>;

    fn rem(self, rhs: Range<N>) -> Id<N> {
        self % Id::from(rhs)
    }
}
