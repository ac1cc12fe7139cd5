use super::Item;
use crate::index::{Id, Range};

/// A work-item inside `Group::parallel_for_work_item`.
///
/// The logical local id walks the flexible range passed to the loop; the physical local id is the
/// logical one wrapped into the group's real local range.
#[derive(Debug, Clone, Copy)]
pub struct HItem<const N: usize> {
    global: Item<N>,
    logical_local: Item<N>,
    physical_local: Item<N>,
}

impl<const N: usize> HItem<N> {
    pub(crate) fn new(global: Item<N>, logical_local: Item<N>, physical_local: Item<N>) -> Self {
        Self {
            global,
            logical_local,
            physical_local,
        }
    }

    pub fn global(&self) -> Item<N> {
        self.global
    }

    /// Same as [`HItem::logical_local`].
    pub fn local(&self) -> Item<N> {
        self.logical_local
    }

    pub fn logical_local(&self) -> Item<N> {
        self.logical_local
    }

    pub fn physical_local(&self) -> Item<N> {
        self.physical_local
    }

    pub fn global_id(&self) -> Id<N> {
        self.global.id()
    }

    pub fn local_id(&self) -> Id<N> {
        self.logical_local.id()
    }

    pub fn physical_local_id(&self) -> Id<N> {
        self.physical_local.id()
    }

    pub fn global_range(&self) -> Range<N> {
        self.global.range()
    }

    pub fn logical_local_range(&self) -> Range<N> {
        self.logical_local.range()
    }

    pub fn physical_local_range(&self) -> Range<N> {
        self.physical_local.range()
    }
}
