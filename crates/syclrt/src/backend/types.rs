//! Launch geometry and the per-lane / per-group contexts executors hand to kernels.

use std::fmt;

use super::barrier::GroupBarrier;
use crate::index::IndexArray;
use crate::memory::{GroupScope, WorkGroupScope};

/// Geometry of one kernel launch, always three slots wide.
///
/// `groups` counts work-groups per dimension and `local` counts lanes per work-group. Unused
/// slots hold 1 (extents) or 0 (offset).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LaunchShape {
    pub dims: usize,
    pub global: IndexArray,
    pub local: IndexArray,
    pub groups: IndexArray,
    pub offset: IndexArray,
}

impl LaunchShape {
    /// Plain data-parallel launch: one work-item per point, each its own group.
    pub fn basic(dims: usize, global: IndexArray, offset: IndexArray) -> Self {
        Self {
            dims,
            global,
            local: IndexArray::splat(1),
            groups: global,
            offset,
        }
    }

    /// Launch of `global / local` work-groups of `local` lanes each.
    pub fn nd(dims: usize, global: IndexArray, local: IndexArray, offset: IndexArray) -> Self {
        let groups = IndexArray::new(global[0] / local[0], global[1] / local[1], global[2] / local[2]);
        Self {
            dims,
            global,
            local,
            groups,
            offset,
        }
    }

    /// Launch of `groups` work-groups whose bodies run once per group.
    pub fn hierarchical(dims: usize, groups: IndexArray, local: IndexArray) -> Self {
        let global = IndexArray::new(groups[0] * local[0], groups[1] * local[1], groups[2] * local[2]);
        Self {
            dims,
            global,
            local,
            groups,
            offset: IndexArray::splat(0),
        }
    }

    /// Single work-item launch.
    pub fn single() -> Self {
        Self::basic(1, IndexArray::splat(1), IndexArray::splat(0))
    }

    pub fn work_items(&self) -> usize {
        self.global.count()
    }

    pub fn group_count(&self) -> usize {
        self.groups.count()
    }

    pub fn lanes_per_group(&self) -> usize {
        self.local.count()
    }

    /// Global id (without offset) at row-major position `linear`.
    pub fn item_at(&self, linear: usize) -> IndexArray {
        IndexArray::delinearize(linear, &self.global)
    }

    pub fn group_at(&self, linear: usize) -> IndexArray {
        IndexArray::delinearize(linear, &self.groups)
    }

    /// Local id of lane `linear`. Lane 0 has the all-zero local id.
    pub fn lane_at(&self, linear: usize) -> IndexArray {
        IndexArray::delinearize(linear, &self.local)
    }
}

impl fmt::Display for LaunchShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} (global {})", self.groups, self.local, self.global)
    }
}

/// What one lane of a work-group sees while it runs.
pub struct LaneContext<'a> {
    pub shape: &'a LaunchShape,
    pub group: IndexArray,
    pub local: IndexArray,
    pub lane: usize,
    pub barrier: &'a GroupBarrier,
    pub scope: &'a GroupScope,
}

impl LaneContext<'_> {
    /// Global id without the launch offset.
    pub fn global(&self) -> IndexArray {
        let (group, local, extent) = (self.group, self.local, self.shape.local);
        IndexArray::new(
            group[0] * extent[0] + local[0],
            group[1] * extent[1] + local[1],
            group[2] * extent[2] + local[2],
        )
    }

    pub fn is_leader(&self) -> bool {
        self.lane == 0
    }
}

impl WorkGroupScope for LaneContext<'_> {
    fn group_scope(&self) -> &GroupScope {
        self.scope
    }
}

/// What a hierarchical work-group body sees while it runs.
pub struct GroupContext<'a> {
    pub shape: &'a LaunchShape,
    pub group: IndexArray,
    pub scope: &'a GroupScope,
}

impl WorkGroupScope for GroupContext<'_> {
    fn group_scope(&self) -> &GroupScope {
        self.scope
    }
}
