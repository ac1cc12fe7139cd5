//! Work-groups as seen from hierarchical kernels and from the lanes of nd-range kernels.

use std::sync::atomic::{fence, Ordering};

use super::{HItem, Item};
use crate::backend::{GroupBarrier, GroupContext};
use crate::index::{Id, IndexArray, Range};
use crate::memory::{strided_copy, Element, ElementPtr, GroupScope, WorkGroupScope};

#[derive(Clone, Copy)]
enum Role<'a> {
    /// A hierarchical work-group body; runs once for the whole group.
    WorkGroup,
    /// One lane of an nd-range work-group.
    Lane { lane: usize, barrier: &'a GroupBarrier },
}

/// Completion handle of a work-group copy.
#[must_use = "wait on the event before reading the copied data"]
pub struct DeviceEvent<'a> {
    barrier: Option<(usize, &'a GroupBarrier)>,
}

impl DeviceEvent<'_> {
    /// Block until the copy is visible to every work-item of the group.
    pub fn wait(self) {
        if let Some((lane, barrier)) = self.barrier {
            barrier.wait(lane);
        }
    }
}

#[derive(Clone, Copy)]
pub struct Group<'a, const N: usize> {
    id: Id<N>,
    global_range: Range<N>,
    local_range: Range<N>,
    scope: &'a GroupScope,
    role: Role<'a>,
}

impl<'a, const N: usize> Group<'a, N> {
    pub(crate) fn for_work_group(context: &GroupContext<'a>) -> Self {
        Self {
            id: Id::from_index_array(context.group),
            global_range: Range::from_index_array(context.shape.global),
            local_range: Range::from_index_array(context.shape.local),
            scope: context.scope,
            role: Role::WorkGroup,
        }
    }

    pub(crate) fn for_lane(
        id: Id<N>,
        global_range: Range<N>,
        local_range: Range<N>,
        scope: &'a GroupScope,
        lane: usize,
        barrier: &'a GroupBarrier,
    ) -> Self {
        Self {
            id,
            global_range,
            local_range,
            scope,
            role: Role::Lane { lane, barrier },
        }
    }

    pub fn id(&self) -> Id<N> {
        self.id
    }

    pub fn get(&self, dimension: usize) -> usize {
        self.id.get(dimension)
    }

    pub fn linear_id(&self) -> usize {
        self.id.linearize(&self.group_range())
    }

    pub fn global_range(&self) -> Range<N> {
        self.global_range
    }

    pub fn local_range(&self) -> Range<N> {
        self.local_range
    }

    pub fn group_range(&self) -> Range<N> {
        self.global_range / self.local_range
    }

    /// True for the lane that performs group-wide work on behalf of the others.
    pub fn is_leader(&self) -> bool {
        match self.role {
            Role::WorkGroup => true,
            Role::Lane { lane, .. } => lane == 0,
        }
    }

    /// Run `body` once for every work-item of the group's physical local range.
    pub fn parallel_for_work_item(&self, body: impl FnMut(HItem<N>)) {
        self.parallel_for_work_item_in(self.local_range, body)
    }

    /// Run `body` once for every point of `flexible`, wrapping logical local ids onto the
    /// physical local range. Slot 0 varies fastest.
    ///
    /// # Panics
    /// When called from an nd-range kernel rather than a hierarchical work-group body.
    pub fn parallel_for_work_item_in(&self, flexible: Range<N>, mut body: impl FnMut(HItem<N>)) {
        assert!(
            matches!(self.role, Role::WorkGroup),
            "parallel_for_work_item is only available inside parallel_for_work_group"
        );
        let flexible_slots = flexible.as_index_array();
        let physical_range = self.local_range.as_index_array();
        let base = self.local_range * self.id;

        for z in 0..flexible_slots[2] {
            for y in 0..flexible_slots[1] {
                for x in 0..flexible_slots[0] {
                    let logical = Id::from_index_array(IndexArray::new(x, y, z));
                    let physical = Id::from_index_array(IndexArray::new(
                        x % physical_range[0],
                        y % physical_range[1],
                        z % physical_range[2],
                    ));
                    body(HItem::new(
                        Item::new(base + physical, self.global_range, Id::zero()),
                        Item::new(logical, flexible, Id::zero()),
                        Item::new(physical, self.local_range, Id::zero()),
                    ));
                }
            }
        }
    }

    /// Copy `count` elements between local and global memory on behalf of the whole group.
    pub fn async_work_group_copy<T, D, S>(&self, dest: D, src: S, count: usize) -> DeviceEvent<'a>
    where
        T: Element,
        D: ElementPtr<T>,
        S: ElementPtr<T>,
    {
        self.async_work_group_copy_strided(dest, src, count, 1)
    }

    /// Like [`Group::async_work_group_copy`], stepping the global side by `stride` elements.
    pub fn async_work_group_copy_strided<T, D, S>(&self, dest: D, src: S, count: usize, stride: usize) -> DeviceEvent<'a>
    where
        T: Element,
        D: ElementPtr<T>,
        S: ElementPtr<T>,
    {
        debug_assert!(D::SPACE != S::SPACE, "work-group copies move data between local and global memory");
        match self.role {
            Role::WorkGroup => {
                strided_copy(&dest, &src, count, stride);
                DeviceEvent { barrier: None }
            }
            Role::Lane { lane, barrier } => {
                barrier.wait(lane);
                if lane == 0 {
                    strided_copy(&dest, &src, count, stride);
                }
                DeviceEvent {
                    barrier: Some((lane, barrier)),
                }
            }
        }
    }

    /// Wait for a batch of copies with a single group barrier.
    pub fn wait_for<I>(&self, events: I)
    where
        I: IntoIterator<Item = DeviceEvent<'a>>,
    {
        let mut pending = None;
        for event in events {
            pending = pending.or(event.barrier);
        }
        if let Some((lane, barrier)) = pending {
            barrier.wait(lane);
        }
    }

    /// Synchronise the lanes of the group. A no-op in hierarchical bodies, which run as one.
    pub fn barrier(&self) {
        fence(Ordering::SeqCst);
        if let Role::Lane { lane, barrier } = self.role {
            barrier.wait(lane);
        }
    }
}

impl<const N: usize> WorkGroupScope for Group<'_, N> {
    fn group_scope(&self) -> &GroupScope {
        self.scope
    }
}

/// Synchronise every work-item of `group`.
pub fn group_barrier<const N: usize>(group: &Group<'_, N>) {
    group.barrier()
}
