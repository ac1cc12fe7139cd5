//! Element pointers into global and local memory, used by the work-group copies.

use super::access::AddressSpace;
use super::storage::Storage;
use super::Element;

/// A typed position inside some memory region.
pub trait ElementPtr<T: Element> {
    const SPACE: AddressSpace;

    /// Elements addressable from this pointer.
    fn remaining(&self) -> usize;
    fn load(&self, index: usize) -> T;
    fn store(&self, index: usize, value: T);
}

macro_rules! element_ptr {
    ($(#[$doc:meta])* $name:ident, $space:expr) => {
        $(#[$doc])*
        #[derive(Clone, Copy)]
        pub struct $name<'a, T: Element> {
            storage: &'a Storage<T>,
            base: usize,
            end: usize,
        }

        impl<'a, T: Element> $name<'a, T> {
            pub(crate) fn new(storage: &'a Storage<T>, base: usize) -> Self {
                Self::bounded(storage, base, storage.len())
            }

            /// Pointer limited to the elements `base..end` of `storage`.
            pub(crate) fn bounded(storage: &'a Storage<T>, base: usize, end: usize) -> Self {
                debug_assert!(end <= storage.len(), "pointer end {end} past {} elements", storage.len());
                Self { storage, base, end }
            }

            /// Pointer `count` elements further on.
            pub fn add(self, count: usize) -> Self {
                assert!(count <= self.remaining(), "moving {count} elements past a {}-element region", self.remaining());
                Self {
                    base: self.base + count,
                    ..self
                }
            }

            pub fn offset(&self) -> usize {
                self.base
            }
        }

        impl<T: Element> ElementPtr<T> for $name<'_, T> {
            const SPACE: AddressSpace = $space;

            fn remaining(&self) -> usize {
                self.end.saturating_sub(self.base)
            }

            fn load(&self, index: usize) -> T {
                assert!(index < self.remaining(), "element {index} outside a {}-element region", self.remaining());
                self.storage.load(self.base + index)
            }

            fn store(&self, index: usize, value: T) {
                assert!(index < self.remaining(), "element {index} outside a {}-element region", self.remaining());
                self.storage.store(self.base + index, value)
            }
        }
    };
}

element_ptr!(
    /// Pointer into a buffer, obtained from [`super::Accessor::pointer`].
    GlobalPtr,
    AddressSpace::Global
);

element_ptr!(
    /// Pointer into work-group local memory, obtained from [`super::LocalView::pointer`].
    LocalPtr,
    AddressSpace::Local
);

/// Copy `count` elements, stepping the global side by `stride`.
pub(crate) fn strided_copy<T, D, S>(dest: &D, src: &S, count: usize, stride: usize)
where
    T: Element,
    D: ElementPtr<T>,
    S: ElementPtr<T>,
{
    let (src_step, dest_step) = if S::SPACE == AddressSpace::Global {
        (stride, 1)
    } else {
        (1, stride)
    };
    for i in 0..count {
        dest.store(i * dest_step, src.load(i * src_step));
    }
}
