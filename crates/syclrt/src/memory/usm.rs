use std::sync::Arc;

use super::pointer::GlobalPtr;
use super::storage::Storage;
use super::Element;
use crate::atomic::{Atomic, AtomicElement};

/// Memory shared between the host and kernels without accessor tracking.
///
/// Commands using a shared allocation are ordered only by the events they explicitly depend on.
#[derive(Clone)]
pub struct SharedAllocation<T: Element> {
    storage: Arc<Storage<T>>,
}

impl<T: Element> SharedAllocation<T> {
    pub(crate) fn zeroed(len: usize) -> Self {
        Self {
            storage: Arc::new(Storage::zeroed(len)),
        }
    }

    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn byte_len(&self) -> usize {
        self.storage.byte_len()
    }

    pub fn read(&self, index: usize) -> T {
        self.storage.load(index)
    }

    pub fn write(&self, index: usize, value: T) {
        self.storage.store(index, value)
    }

    pub fn update(&self, index: usize, f: impl FnOnce(T) -> T) {
        self.storage.store(index, f(self.storage.load(index)))
    }

    pub fn atomic(&self, index: usize) -> Atomic<'_, T>
    where
        T: AtomicElement,
    {
        let cell = self.storage.cell(index);
        // SAFETY: the cell is owned by storage kept alive by `self`.
        unsafe { Atomic::from_ptr(cell.as_ptr()) }
    }

    pub fn pointer(&self) -> GlobalPtr<'_, T> {
        GlobalPtr::new(&self.storage, 0)
    }

    pub fn fill(&self, value: T) {
        for index in 0..self.len() {
            self.storage.store(index, value);
        }
    }

    pub fn copy_from_slice(&self, values: &[T]) {
        assert_eq!(values.len(), self.len(), "shared allocation length mismatch");
        self.storage.copy_from(values);
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.storage.to_vec()
    }
}

impl<T: Element> std::fmt::Debug for SharedAllocation<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedAllocation")
            .field("element", &T::KIND)
            .field("len", &self.len())
            .finish()
    }
}
