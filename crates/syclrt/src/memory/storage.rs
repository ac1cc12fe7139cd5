//! Element cells shared between the host and concurrently running kernels.
//!
//! Kernels may touch distinct elements of the same storage from many lanes at once, so every
//! element lives in its own [`SyncCell`]. Conflicting access to one element is excluded by the
//! dependency engine between submissions and by barriers or atomics within a kernel.

use std::cell::UnsafeCell;

use super::Element;

#[repr(transparent)]
pub(crate) struct SyncCell<T>(UnsafeCell<T>);

// SAFETY: cells are only read and written by value; concurrent access to one cell is excluded by
// the scheduling rules described in the module docs or goes through atomics.
unsafe impl<T: Send> Sync for SyncCell<T> {}

impl<T: Copy> SyncCell<T> {
    pub(crate) fn new(value: T) -> Self {
        Self(UnsafeCell::new(value))
    }

    pub(crate) fn load(&self) -> T {
        // SAFETY: see the `Sync` impl.
        unsafe { *self.0.get() }
    }

    pub(crate) fn store(&self, value: T) {
        // SAFETY: see the `Sync` impl.
        unsafe { *self.0.get() = value }
    }

    pub(crate) fn as_ptr(&self) -> *mut T {
        self.0.get()
    }
}

/// A fixed-length run of element cells.
pub(crate) struct Storage<T> {
    cells: Box<[SyncCell<T>]>,
}

impl<T: Element> Storage<T> {
    pub(crate) fn zeroed(len: usize) -> Self {
        Self::from_vec(vec![<T as bytemuck::Zeroable>::zeroed(); len])
    }

    pub(crate) fn from_vec(values: Vec<T>) -> Self {
        Self {
            cells: values.into_iter().map(SyncCell::new).collect(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.cells.len()
    }

    pub(crate) fn byte_len(&self) -> usize {
        self.cells.len() * std::mem::size_of::<T>()
    }

    pub(crate) fn cell(&self, index: usize) -> &SyncCell<T> {
        &self.cells[index]
    }

    pub(crate) fn load(&self, index: usize) -> T {
        self.cells[index].load()
    }

    pub(crate) fn store(&self, index: usize, value: T) {
        self.cells[index].store(value)
    }

    pub(crate) fn to_vec(&self) -> Vec<T> {
        self.cells.iter().map(SyncCell::load).collect()
    }

    pub(crate) fn copy_to(&self, dest: &mut [T]) {
        for (slot, cell) in dest.iter_mut().zip(self.cells.iter()) {
            *slot = cell.load();
        }
    }

    pub(crate) fn copy_from(&self, src: &[T]) {
        for (cell, value) in self.cells.iter().zip(src) {
            cell.store(*value);
        }
    }

    /// # Safety
    /// No kernel or other host view may write the storage while the slice is alive.
    pub(crate) unsafe fn as_slice(&self) -> &[T] {
        std::slice::from_raw_parts(self.cells.as_ptr().cast::<T>(), self.cells.len())
    }

    /// # Safety
    /// No kernel or other host view may access the storage while the slice is alive.
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn as_mut_slice(&self) -> &mut [T] {
        std::slice::from_raw_parts_mut(self.cells.as_ptr().cast::<T>().cast_mut(), self.cells.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zeroed_storage_reads_zero() {
        let storage = Storage::<f32>::zeroed(8);
        assert_eq!(storage.len(), 8);
        assert_eq!(storage.byte_len(), 32);
        assert!(storage.to_vec().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn loads_observe_stores() {
        let storage = Storage::from_vec(vec![1u32, 2, 3]);
        storage.store(1, 20);
        assert_eq!(storage.load(1), 20);
        let mut host = [0u32; 3];
        storage.copy_to(&mut host);
        assert_eq!(host, [1, 20, 3]);
    }

    #[test]
    fn slices_alias_the_cells() {
        let storage = Storage::from_vec(vec![5i64; 4]);
        unsafe { storage.as_mut_slice()[2] = 9 };
        assert_eq!(unsafe { storage.as_slice() }, &[5, 5, 9, 5]);
    }
}
