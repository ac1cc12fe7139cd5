use std::fmt;
use std::ops::{Index, IndexMut};

/// Three coordinate slots `(x, y, z)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct IndexArray([usize; 3]);

impl IndexArray {
    pub const fn new(x: usize, y: usize, z: usize) -> Self {
        Self([x, y, z])
    }

    /// The same value in every slot.
    pub const fn splat(value: usize) -> Self {
        Self([value; 3])
    }

    /// Place `values` in the leading slots and `fill` in the rest.
    pub fn from_leading(values: &[usize], fill: usize) -> Self {
        assert!(values.len() <= 3, "an index array holds at most three slots");
        let mut slots = [fill; 3];
        slots[..values.len()].copy_from_slice(values);
        Self(slots)
    }

    pub const fn to_array(self) -> [usize; 3] {
        self.0
    }

    /// Slot value; `dimension` must be below 3.
    pub fn get(&self, dimension: usize) -> usize {
        self[dimension]
    }

    pub fn set(&mut self, dimension: usize, value: usize) {
        self[dimension] = value;
    }

    /// Compare only the first `n` slots.
    pub fn is_equal(&self, other: &Self, n: usize) -> bool {
        self.0[..n] == other.0[..n]
    }

    /// Product of all three slots.
    pub fn count(&self) -> usize {
        self.0.iter().product()
    }

    /// Row-major position of `self` inside `range`, slot 2 varying fastest.
    pub fn linearize(&self, range: &IndexArray) -> usize {
        (self.0[0] * range.0[1] + self.0[1]) * range.0[2] + self.0[2]
    }

    /// Inverse of [`IndexArray::linearize`].
    pub fn delinearize(linear: usize, range: &IndexArray) -> Self {
        let z = linear % range.0[2];
        let rest = linear / range.0[2];
        Self([rest / range.0[1], rest % range.0[1], z])
    }

    pub(crate) fn zip_with(self, other: Self, n: usize, fill: usize, f: impl Fn(usize, usize) -> usize) -> Self {
        let mut out = [fill; 3];
        for (k, slot) in out.iter_mut().enumerate().take(n) {
            *slot = f(self.0[k], other.0[k]);
        }
        Self(out)
    }
}

impl Index<usize> for IndexArray {
    type Output = usize;

    fn index(&self, dimension: usize) -> &usize {
        assert!(dimension < 3, "dimension {dimension} out of range, index arrays have 3 slots");
        &self.0[dimension]
    }
}

impl IndexMut<usize> for IndexArray {
    fn index_mut(&mut self, dimension: usize) -> &mut usize {
        assert!(dimension < 3, "dimension {dimension} out of range, index arrays have 3 slots");
        &mut self.0[dimension]
    }
}

impl From<[usize; 3]> for IndexArray {
    fn from(slots: [usize; 3]) -> Self {
        Self(slots)
    }
}

impl fmt::Display for IndexArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.0[0], self.0[1], self.0[2])
    }
}
