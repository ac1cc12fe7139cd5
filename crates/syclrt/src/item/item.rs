use crate::index::{Id, Range};

/// A work-item of a basic data-parallel launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Item<const N: usize> {
    id: Id<N>,
    range: Range<N>,
    offset: Id<N>,
}

impl<const N: usize> Item<N> {
    pub(crate) fn new(id: Id<N>, range: Range<N>, offset: Id<N>) -> Self {
        Self { id, range, offset }
    }

    /// Global id, offset included.
    pub fn id(&self) -> Id<N> {
        self.id
    }

    pub fn get(&self, dimension: usize) -> usize {
        self.id.get(dimension)
    }

    pub fn range(&self) -> Range<N> {
        self.range
    }

    pub fn offset(&self) -> Id<N> {
        self.offset
    }

    /// Row-major position of the item within its range, offset removed.
    pub fn linear_id(&self) -> usize {
        (self.id - self.offset).linearize(&self.range)
    }
}

impl<const N: usize> From<Item<N>> for Id<N> {
    fn from(item: Item<N>) -> Self {
        item.id
    }
}
