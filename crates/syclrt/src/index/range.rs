use super::{Id, IndexArray};

/// The extent of an index space of `N` dimensions.
#[derive(Clone, Copy)]
pub struct Range<const N: usize> {
    slots: IndexArray,
}

index_value!(Range, 1);

impl<const N: usize> Range<N> {
    /// Number of points in the space.
    pub fn size(&self) -> usize {
        self.slots.count()
    }

    /// True when some extent is zero, in which case iteration yields nothing.
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn contains(&self, id: &Id<N>) -> bool {
        (0..N).all(|k| id.get(k) < self.get(k))
    }

    /// Id at row-major position `linear`.
    pub fn delinearize(&self, linear: usize) -> Id<N> {
        Id::from_index_array(IndexArray::delinearize(linear, &self.slots))
    }

    /// Every id of the space in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = Id<N>> + '_ {
        (0..self.size()).map(move |linear| self.delinearize(linear))
    }
}

impl<const N: usize> std::ops::Mul<Id<N>> for Range<N> {
    type Output = Id<N>;

    fn mul(self, rhs: Id<N>) -> Id<N> {
        Id::from(self) * rhs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unused_slots_stay_one() {
        let range = Range::new([4]);
        assert_eq!(range.as_index_array(), IndexArray::new(4, 1, 1));
        assert_eq!((range * 2).as_index_array(), IndexArray::new(8, 1, 1));
        assert_eq!(range.size(), 4);
    }

    #[test]
    fn equality_covers_logical_slots_only() {
        let a = Range::<2>::from_index_array(IndexArray::new(2, 3, 9));
        assert_eq!(a, Range::new([2, 3]));
        assert_eq!(a.as_index_array().get(2), 1);
    }

    #[test]
    fn iteration_is_row_major() {
        let ids: Vec<_> = Range::new([2, 2]).iter().collect();
        assert_eq!(ids, vec![Id::new([0, 0]), Id::new([0, 1]), Id::new([1, 0]), Id::new([1, 1])]);
    }

    #[test]
    fn zero_extent_is_empty() {
        let range = Range::new([4, 0]);
        assert!(range.is_empty());
        assert_eq!(range.iter().count(), 0);
    }

    #[test]
    fn contains_checks_every_dimension() {
        let range = Range::new([4, 2, 3]);
        assert!(range.contains(&Id::new([3, 1, 2])));
        assert!(!range.contains(&Id::new([3, 2, 0])));
    }

    #[test]
    fn range_times_id_is_an_id() {
        assert_eq!(Range::new([4, 4]) * Id::new([2, 3]), Id::new([8, 12]));
    }
}
