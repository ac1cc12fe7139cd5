use std::sync::atomic::{fence, Ordering};

use super::{DeviceEvent, FenceSpace, Group};
use crate::backend::{GroupBarrier, LaneContext};
use crate::index::{Id, NdRange, Range};
use crate::memory::{Element, ElementPtr, GroupScope, WorkGroupScope};

/// A work-item of an nd-range launch: one lane of a work-group.
#[derive(Clone, Copy)]
pub struct NdItem<'a, const N: usize> {
    global: Id<N>,
    local: Id<N>,
    group: Id<N>,
    nd_range: NdRange<N>,
    lane: usize,
    barrier: &'a GroupBarrier,
    scope: &'a GroupScope,
}

impl<'a, const N: usize> NdItem<'a, N> {
    pub(crate) fn from_lane(context: &LaneContext<'a>, nd_range: NdRange<N>) -> Self {
        Self {
            global: Id::from_index_array(context.global()) + nd_range.offset(),
            local: Id::from_index_array(context.local),
            group: Id::from_index_array(context.group),
            nd_range,
            lane: context.lane,
            barrier: context.barrier,
            scope: context.scope,
        }
    }

    /// Global id, offset included.
    pub fn global_id(&self) -> Id<N> {
        self.global
    }

    pub fn global(&self, dimension: usize) -> usize {
        self.global.get(dimension)
    }

    pub fn global_linear_id(&self) -> usize {
        (self.global - self.nd_range.offset()).linearize(&self.nd_range.global_range())
    }

    pub fn local_id(&self) -> Id<N> {
        self.local
    }

    pub fn local(&self, dimension: usize) -> usize {
        self.local.get(dimension)
    }

    pub fn local_linear_id(&self) -> usize {
        self.local.linearize(&self.nd_range.local_range())
    }

    pub fn group(&self) -> Group<'a, N> {
        Group::for_lane(
            self.group,
            self.nd_range.global_range(),
            self.nd_range.local_range(),
            self.scope,
            self.lane,
            self.barrier,
        )
    }

    pub fn group_id(&self) -> Id<N> {
        self.group
    }

    pub fn group_linear_id(&self) -> usize {
        self.group.linearize(&self.nd_range.group_range())
    }

    pub fn global_range(&self) -> Range<N> {
        self.nd_range.global_range()
    }

    pub fn local_range(&self) -> Range<N> {
        self.nd_range.local_range()
    }

    pub fn group_range(&self) -> Range<N> {
        self.nd_range.group_range()
    }

    pub fn offset(&self) -> Id<N> {
        self.nd_range.offset()
    }

    pub fn nd_range(&self) -> NdRange<N> {
        self.nd_range
    }

    /// Wait until every work-item of the group has reached this barrier. Writes made before it
    /// are visible to the whole group after it.
    pub fn barrier(&self, _space: FenceSpace) {
        fence(Ordering::SeqCst);
        self.barrier.wait(self.lane);
    }

    /// Order this work-item's memory operations without synchronising with the others.
    pub fn mem_fence(&self, _space: FenceSpace) {
        fence(Ordering::SeqCst);
    }

    pub fn async_work_group_copy<T, D, S>(&self, dest: D, src: S, count: usize) -> DeviceEvent<'a>
    where
        T: Element,
        D: ElementPtr<T>,
        S: ElementPtr<T>,
    {
        self.group().async_work_group_copy(dest, src, count)
    }

    pub fn async_work_group_copy_strided<T, D, S>(&self, dest: D, src: S, count: usize, stride: usize) -> DeviceEvent<'a>
    where
        T: Element,
        D: ElementPtr<T>,
        S: ElementPtr<T>,
    {
        self.group().async_work_group_copy_strided(dest, src, count, stride)
    }

    pub fn wait_for<I>(&self, events: I)
    where
        I: IntoIterator<Item = DeviceEvent<'a>>,
    {
        self.group().wait_for(events)
    }
}

impl<const N: usize> WorkGroupScope for NdItem<'_, N> {
    fn group_scope(&self) -> &GroupScope {
        self.scope
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BarrierMode, LaunchShape};
    use crate::index::IndexArray;

    #[test]
    fn ids_combine_group_local_and_offset() {
        let nd = NdRange::with_offset(Range::new([8, 4]), Range::new([4, 2]), Id::new([1, 0]));
        let shape = LaunchShape::nd(
            2,
            nd.global_range().as_index_array(),
            nd.local_range().as_index_array(),
            nd.offset().as_index_array(),
        );
        let scope = GroupScope::allocate(0, &[]);
        let barrier = GroupBarrier::new(1, BarrierMode::Parallel);
        let lane = 3;
        let context = LaneContext {
            shape: &shape,
            group: IndexArray::new(1, 1, 0),
            local: shape.lane_at(lane),
            lane,
            barrier: &barrier,
            scope: &scope,
        };
        let item = NdItem::<2>::from_lane(&context, nd);

        assert_eq!(item.local_id(), Id::new([1, 1]));
        assert_eq!(item.global_id(), Id::new([6, 3]));
        assert_eq!(item.global_linear_id(), 5 * 4 + 3);
        assert_eq!(item.local_linear_id(), 3);
        assert_eq!(item.group_linear_id(), 3);
        assert_eq!(item.group_range(), Range::new([2, 2]));
        assert!(!item.group().is_leader());
    }
}
