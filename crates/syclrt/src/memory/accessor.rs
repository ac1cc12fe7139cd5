use std::sync::Arc;

use super::pointer::GlobalPtr;
use super::storage::Storage;
use super::{AccessDescriptor, AccessMode, AccessRange, AccessTarget, Element};
use crate::atomic::{Atomic, AtomicElement};
use crate::index::{Id, Range};

/// Kernel-side view of a buffer region.
///
/// Indices are relative to the accessor's offset. Reading through a write-only accessor, writing
/// through a read-only one, or leaving the accessor's range are contract violations checked in
/// debug builds; leaving the buffer itself always panics.
///
/// An accessor belongs to the command group that requested it; handing it to
/// [`Handler::fill`](crate::Handler::fill) or [`Handler::copy`](crate::Handler::copy)
/// of another submission is rejected.
#[derive(Clone)]
pub struct Accessor<T: Element, const N: usize = 1> {
    command: u64,
    storage: Arc<Storage<T>>,
    buffer_range: Range<N>,
    offset: Id<N>,
    range: Range<N>,
    mode: AccessMode,
    target: AccessTarget,
}

impl<T: Element, const N: usize> Accessor<T, N> {
    pub(crate) fn new(
        command: u64,
        storage: Arc<Storage<T>>,
        buffer_range: Range<N>,
        offset: Id<N>,
        range: Range<N>,
        mode: AccessMode,
        target: AccessTarget,
    ) -> Self {
        Self {
            command,
            storage,
            buffer_range,
            offset,
            range,
            mode,
            target,
        }
    }

    fn linear(&self, index: Id<N>) -> usize {
        debug_assert!(self.range.contains(&index), "index {index} outside accessor range {}", self.range);
        (self.offset + index).linearize(&self.buffer_range)
    }

    /// Id of the submission that requested this accessor.
    pub fn command_id(&self) -> u64 {
        self.command
    }

    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    pub fn target(&self) -> AccessTarget {
        self.target
    }

    pub fn range(&self) -> Range<N> {
        self.range
    }

    pub fn offset(&self) -> Id<N> {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.range.size()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn access_range(&self) -> AccessRange {
        AccessRange::new(self.offset.as_index_array(), self.range.as_index_array())
    }

    pub fn descriptor(&self) -> AccessDescriptor {
        AccessDescriptor {
            element: T::KIND,
            dims: N,
            mode: self.mode,
            target: self.target,
        }
    }

    pub fn read(&self, index: impl Into<Id<N>>) -> T {
        debug_assert!(self.mode.can_read(), "read through a {:?} accessor", self.mode);
        self.storage.load(self.linear(index.into()))
    }

    pub fn write(&self, index: impl Into<Id<N>>, value: T) {
        debug_assert!(self.mode.can_write(), "write through a {:?} accessor", self.mode);
        self.storage.store(self.linear(index.into()), value)
    }

    /// Read-modify-write of one element. Not atomic.
    pub fn update(&self, index: impl Into<Id<N>>, f: impl FnOnce(T) -> T) {
        let linear = self.linear(index.into());
        self.storage.store(linear, f(self.storage.load(linear)))
    }

    pub fn atomic(&self, index: impl Into<Id<N>>) -> Atomic<'_, T>
    where
        T: AtomicElement,
    {
        let cell = self.storage.cell(self.linear(index.into()));
        // SAFETY: the cell is owned by storage kept alive by `self`.
        unsafe { Atomic::from_ptr(cell.as_ptr()) }
    }

    /// Pointer to the first element of the accessor's region, ending after its last element.
    pub fn pointer(&self) -> GlobalPtr<'_, T> {
        let base = self.offset.linearize(&self.buffer_range);
        let end = if self.is_empty() {
            base
        } else {
            ((self.offset + self.range) - 1usize).linearize(&self.buffer_range) + 1
        };
        GlobalPtr::bounded(&self.storage, base, end)
    }
}
