//! Work-group local memory.
//!
//! A command group declares scratch regions with [`crate::Handler::local_accessor`]. The executor
//! allocates a fresh, zeroed copy of every declared region for each work-group it runs, and a
//! kernel reaches its group's copy by binding the accessor to its item or group.

use std::any::Any;
use std::marker::PhantomData;

use super::pointer::LocalPtr;
use super::storage::Storage;
use super::{AccessDescriptor, AccessMode, AccessTarget, Element, ElementKind};
use crate::atomic::{Atomic, AtomicElement};
use crate::index::{Id, Range};

/// One declared local region.
#[derive(Debug, Clone, Copy)]
pub struct LocalDecl {
    len: usize,
    kind: ElementKind,
    allocate: fn(usize) -> Box<dyn Any + Send + Sync>,
}

fn allocate_block<T: Element>(len: usize) -> Box<dyn Any + Send + Sync> {
    Box::new(Storage::<T>::zeroed(len))
}

impl LocalDecl {
    pub(crate) fn new<T: Element>(len: usize) -> Self {
        Self {
            len,
            kind: T::KIND,
            allocate: allocate_block::<T>,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn byte_len(&self) -> usize {
        self.len * self.kind.size_bytes()
    }
}

/// The local memory of one running work-group.
pub struct GroupScope {
    command: u64,
    blocks: Vec<Box<dyn Any + Send + Sync>>,
}

impl GroupScope {
    pub(crate) fn allocate(command: u64, decls: &[LocalDecl]) -> Self {
        Self {
            command,
            blocks: decls.iter().map(|decl| (decl.allocate)(decl.len)).collect(),
        }
    }

    fn block<T: Element>(&self, command: u64, slot: usize) -> &Storage<T> {
        assert_eq!(
            self.command, command,
            "local accessor bound inside a kernel of a different command group"
        );
        self.blocks
            .get(slot)
            .and_then(|block| block.downcast_ref::<Storage<T>>())
            .unwrap_or_else(|| panic!("local memory slot {slot} does not hold {} elements", T::KIND))
    }
}

/// Anything running inside a work-group and therefore able to reach its local memory.
pub trait WorkGroupScope {
    fn group_scope(&self) -> &GroupScope;
}

/// Handle to a local region declared on a handler. Bind it inside the kernel to use it.
pub struct LocalAccessor<T: Element, const N: usize = 1> {
    command: u64,
    slot: usize,
    range: Range<N>,
    _element: PhantomData<fn() -> T>,
}

impl<T: Element, const N: usize> Clone for LocalAccessor<T, N> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: Element, const N: usize> Copy for LocalAccessor<T, N> {}

impl<T: Element, const N: usize> LocalAccessor<T, N> {
    pub(crate) fn new(command: u64, slot: usize, range: Range<N>) -> Self {
        Self {
            command,
            slot,
            range,
            _element: PhantomData,
        }
    }

    pub fn range(&self) -> Range<N> {
        self.range
    }

    pub fn descriptor(&self) -> AccessDescriptor {
        AccessDescriptor {
            element: T::KIND,
            dims: N,
            mode: AccessMode::ReadWrite,
            target: AccessTarget::Local,
        }
    }

    /// The current work-group's copy of the region.
    pub fn bind<'s, S: WorkGroupScope>(&self, scope: &'s S) -> LocalView<'s, T, N> {
        LocalView {
            storage: scope.group_scope().block::<T>(self.command, self.slot),
            range: self.range,
        }
    }
}

/// A work-group's local region, valid for the lifetime of the item or group it was bound from.
#[derive(Clone, Copy)]
pub struct LocalView<'s, T: Element, const N: usize = 1> {
    storage: &'s Storage<T>,
    range: Range<N>,
}

impl<'s, T: Element, const N: usize> LocalView<'s, T, N> {
    fn linear(&self, index: Id<N>) -> usize {
        debug_assert!(self.range.contains(&index), "local index {index} outside {}", self.range);
        index.linearize(&self.range)
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
        self.storage.load(self.linear(index.into()))
    }

    pub fn write(&self, index: impl Into<Id<N>>, value: T) {
        self.storage.store(self.linear(index.into()), value)
    }

    pub fn update(&self, index: impl Into<Id<N>>, f: impl FnOnce(T) -> T) {
        let linear = self.linear(index.into());
        self.storage.store(linear, f(self.storage.load(linear)))
    }

    pub fn pointer(&self) -> LocalPtr<'s, T> {
        LocalPtr::new(self.storage, 0)
    }

    pub fn atomic(&self, index: impl Into<Id<N>>) -> Atomic<'s, T>
    where
        T: AtomicElement,
    {
        let cell = self.storage.cell(self.linear(index.into()));
        // SAFETY: the cell lives as long as the group scope borrowed for 's.
        unsafe { Atomic::from_ptr(cell.as_ptr()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::pointer::ElementPtr;

    struct Scoped(GroupScope);

    impl WorkGroupScope for Scoped {
        fn group_scope(&self) -> &GroupScope {
            &self.0
        }
    }

    #[test]
    fn each_scope_gets_zeroed_blocks() {
        let decls = [LocalDecl::new::<u32>(4), LocalDecl::new::<f64>(2)];
        assert_eq!(decls[1].byte_len(), 16);
        let scope = Scoped(GroupScope::allocate(7, &decls));

        let ints = LocalAccessor::<u32, 1>::new(7, 0, Range::new([4]));
        let view = ints.bind(&scope);
        assert_eq!(view.read(3usize), 0);
        view.write(3usize, 11);
        view.update(3usize, |v| v + 1);
        assert_eq!(view.read(3usize), 12);
        assert_eq!(view.atomic(0usize).fetch_add(2), 0);
        assert_eq!(view.read(0usize), 2);

        let other = Scoped(GroupScope::allocate(7, &decls));
        assert_eq!(ints.bind(&other).read(3usize), 0);
    }

    #[test]
    fn two_dimensional_views_are_row_major() {
        let decls = [LocalDecl::new::<i32>(6)];
        let scope = Scoped(GroupScope::allocate(1, &decls));
        let tile = LocalAccessor::<i32, 2>::new(1, 0, Range::new([2, 3]));
        let view = tile.bind(&scope);
        view.write([1, 0], 5);
        assert_eq!(view.pointer().load(3), 5);
    }

    #[test]
    #[should_panic(expected = "different command group")]
    fn binding_in_a_foreign_command_group_panics() {
        let scope = Scoped(GroupScope::allocate(1, &[LocalDecl::new::<i32>(1)]));
        let _ = LocalAccessor::<i32, 1>::new(2, 0, Range::new([1])).bind(&scope);
    }
}
