use super::storage::Storage;
use super::{AccessMode, Element};
use crate::index::{Id, Range};
use crate::queue::Event;

/// Host view of a buffer, obtained from [`super::Buffer::host_access`].
///
/// While it lives, every later command touching the buffer in a conflicting way waits.
pub struct HostAccessor<'b, T: Element, const N: usize = 1> {
    storage: &'b Storage<T>,
    range: Range<N>,
    mode: AccessMode,
    hold: Event,
}

impl<'b, T: Element, const N: usize> HostAccessor<'b, T, N> {
    pub(crate) fn new(storage: &'b Storage<T>, range: Range<N>, mode: AccessMode, hold: Event) -> Self {
        Self {
            storage,
            range,
            mode,
            hold,
        }
    }

    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    pub fn range(&self) -> Range<N> {
        self.range
    }

    pub fn len(&self) -> usize {
        self.range.size()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn read(&self, index: impl Into<Id<N>>) -> T {
        self.storage.load(index.into().linearize(&self.range))
    }

    pub fn write(&self, index: impl Into<Id<N>>, value: T) {
        assert!(self.mode.can_write(), "write through a {:?} host accessor", self.mode);
        self.storage.store(index.into().linearize(&self.range), value)
    }

    pub fn as_slice(&self) -> &[T] {
        // SAFETY: the hold event keeps every conflicting writer out while `self` lives.
        unsafe { self.storage.as_slice() }
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        assert!(self.mode.can_write(), "mutable slice through a {:?} host accessor", self.mode);
        // SAFETY: a writing hold excludes every other access to the buffer while `self` lives.
        unsafe { self.storage.as_mut_slice() }
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(self.as_slice())
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.storage.to_vec()
    }
}

impl<T: Element, const N: usize> Drop for HostAccessor<'_, T, N> {
    fn drop(&mut self) {
        self.hold.finish(Ok(()));
    }
}
