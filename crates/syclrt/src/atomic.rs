//! Relaxed atomics over buffer, local and shared-allocation elements.
//!
//! Only relaxed ordering exists. Load, store, exchange and compare-exchange map directly onto the
//! platform's lock-free instructions; `fetch_min` and `fetch_max` are compare-exchange loops.

use std::sync::atomic::{AtomicI32, AtomicI64, AtomicU32, AtomicU64, Ordering};

use crate::memory::Element;

/// Memory ordering of every atomic operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum MemoryOrder {
    #[default]
    Relaxed,
}

impl From<MemoryOrder> for Ordering {
    fn from(order: MemoryOrder) -> Self {
        match order {
            MemoryOrder::Relaxed => Ordering::Relaxed,
        }
    }
}

/// Element types with a lock-free atomic representation of the same size.
pub trait AtomicElement: Element + PartialOrd {
    type Repr: Send + Sync;

    /// # Safety
    /// `ptr` must be valid, aligned for `Self::Repr` and only accessed atomically for `'a`.
    unsafe fn repr<'a>(ptr: *mut Self) -> &'a Self::Repr;

    fn atomic_load(repr: &Self::Repr, order: Ordering) -> Self;
    fn atomic_store(repr: &Self::Repr, value: Self, order: Ordering);
    fn atomic_swap(repr: &Self::Repr, value: Self, order: Ordering) -> Self;
    fn atomic_compare_exchange(repr: &Self::Repr, current: Self, new: Self, order: Ordering) -> Result<Self, Self>;
    fn atomic_compare_exchange_weak(repr: &Self::Repr, current: Self, new: Self, order: Ordering)
        -> Result<Self, Self>;
}

/// Integer element types that also support the arithmetic and bitwise fetch operations.
pub trait AtomicInteger: AtomicElement {
    fn atomic_fetch_add(repr: &Self::Repr, value: Self, order: Ordering) -> Self;
    fn atomic_fetch_sub(repr: &Self::Repr, value: Self, order: Ordering) -> Self;
    fn atomic_fetch_and(repr: &Self::Repr, value: Self, order: Ordering) -> Self;
    fn atomic_fetch_or(repr: &Self::Repr, value: Self, order: Ordering) -> Self;
    fn atomic_fetch_xor(repr: &Self::Repr, value: Self, order: Ordering) -> Self;
}

macro_rules! atomic_integer {
    ($($ty:ty => $atomic:ty),+ $(,)?) => {
        $(
            impl AtomicElement for $ty {
                type Repr = $atomic;

                unsafe fn repr<'a>(ptr: *mut Self) -> &'a Self::Repr {
                    <$atomic>::from_ptr(ptr)
                }

                fn atomic_load(repr: &Self::Repr, order: Ordering) -> Self {
                    repr.load(order)
                }

                fn atomic_store(repr: &Self::Repr, value: Self, order: Ordering) {
                    repr.store(value, order)
                }

                fn atomic_swap(repr: &Self::Repr, value: Self, order: Ordering) -> Self {
                    repr.swap(value, order)
                }

                fn atomic_compare_exchange(repr: &Self::Repr, current: Self, new: Self, order: Ordering) -> Result<Self, Self> {
                    repr.compare_exchange(current, new, order, order)
                }

                fn atomic_compare_exchange_weak(repr: &Self::Repr, current: Self, new: Self, order: Ordering) -> Result<Self, Self> {
                    repr.compare_exchange_weak(current, new, order, order)
                }
            }

            impl AtomicInteger for $ty {
                fn atomic_fetch_add(repr: &Self::Repr, value: Self, order: Ordering) -> Self {
                    repr.fetch_add(value, order)
                }

                fn atomic_fetch_sub(repr: &Self::Repr, value: Self, order: Ordering) -> Self {
                    repr.fetch_sub(value, order)
                }

                fn atomic_fetch_and(repr: &Self::Repr, value: Self, order: Ordering) -> Self {
                    repr.fetch_and(value, order)
                }

                fn atomic_fetch_or(repr: &Self::Repr, value: Self, order: Ordering) -> Self {
                    repr.fetch_or(value, order)
                }

                fn atomic_fetch_xor(repr: &Self::Repr, value: Self, order: Ordering) -> Self {
                    repr.fetch_xor(value, order)
                }
            }
        )+
    };
}

atomic_integer!(i32 => AtomicI32, u32 => AtomicU32, i64 => AtomicI64, u64 => AtomicU64);

// Floats go through their bit patterns; compare-exchange compares bits, not values.
macro_rules! atomic_float {
    ($($ty:ty => $atomic:ty, $bits:ty),+ $(,)?) => {
        $(
            impl AtomicElement for $ty {
                type Repr = $atomic;

                unsafe fn repr<'a>(ptr: *mut Self) -> &'a Self::Repr {
                    <$atomic>::from_ptr(ptr.cast::<$bits>())
                }

                fn atomic_load(repr: &Self::Repr, order: Ordering) -> Self {
                    <$ty>::from_bits(repr.load(order))
                }

                fn atomic_store(repr: &Self::Repr, value: Self, order: Ordering) {
                    repr.store(value.to_bits(), order)
                }

                fn atomic_swap(repr: &Self::Repr, value: Self, order: Ordering) -> Self {
                    <$ty>::from_bits(repr.swap(value.to_bits(), order))
                }

                fn atomic_compare_exchange(repr: &Self::Repr, current: Self, new: Self, order: Ordering) -> Result<Self, Self> {
                    repr.compare_exchange(current.to_bits(), new.to_bits(), order, order)
                        .map(<$ty>::from_bits)
                        .map_err(<$ty>::from_bits)
                }

                fn atomic_compare_exchange_weak(repr: &Self::Repr, current: Self, new: Self, order: Ordering) -> Result<Self, Self> {
                    repr.compare_exchange_weak(current.to_bits(), new.to_bits(), order, order)
                        .map(<$ty>::from_bits)
                        .map_err(<$ty>::from_bits)
                }
            }
        )+
    };
}

atomic_float!(f32 => AtomicU32, u32, f64 => AtomicU64, u64);

/// Atomic view of one element.
pub struct Atomic<'a, T: AtomicElement> {
    repr: &'a T::Repr,
}

impl<'a, T: AtomicElement> Atomic<'a, T> {
    /// View an existing std atomic, e.g. `Atomic::<i32>::from_ref(&AtomicI32::new(0))`.
    pub fn from_ref(repr: &'a T::Repr) -> Self {
        Self { repr }
    }

    /// # Safety
    /// `ptr` must stay valid for `'a`, and must only be accessed atomically while the view is
    /// used concurrently.
    pub(crate) unsafe fn from_ptr(ptr: *mut T) -> Self {
        Self { repr: T::repr(ptr) }
    }

    pub const fn order(&self) -> MemoryOrder {
        MemoryOrder::Relaxed
    }

    fn ordering() -> Ordering {
        MemoryOrder::Relaxed.into()
    }

    pub fn store(&self, value: T) {
        T::atomic_store(self.repr, value, Self::ordering())
    }

    pub fn load(&self) -> T {
        T::atomic_load(self.repr, Self::ordering())
    }

    pub fn exchange(&self, value: T) -> T {
        T::atomic_swap(self.repr, value, Self::ordering())
    }

    /// Replace the value with `desired` if it equals `*expected`. On failure `*expected` receives
    /// the value that was found.
    pub fn compare_exchange_strong(&self, expected: &mut T, desired: T) -> bool {
        match T::atomic_compare_exchange(self.repr, *expected, desired, Self::ordering()) {
            Ok(_) => true,
            Err(found) => {
                *expected = found;
                false
            }
        }
    }

    /// Store `operand` if it is smaller than the current value. Returns the prior value.
    pub fn fetch_min(&self, operand: T) -> T {
        let mut old = self.load();
        loop {
            if old < operand {
                break;
            }
            match T::atomic_compare_exchange_weak(self.repr, old, operand, Self::ordering()) {
                Ok(_) => break,
                Err(found) => old = found,
            }
        }
        old
    }

    /// Store `operand` if it is larger than the current value. Returns the prior value.
    pub fn fetch_max(&self, operand: T) -> T {
        let mut old = self.load();
        loop {
            if operand < old {
                break;
            }
            match T::atomic_compare_exchange_weak(self.repr, old, operand, Self::ordering()) {
                Ok(_) => break,
                Err(found) => old = found,
            }
        }
        old
    }
}

impl<T: AtomicInteger> Atomic<'_, T> {
    pub fn fetch_add(&self, value: T) -> T {
        T::atomic_fetch_add(self.repr, value, Self::ordering())
    }

    pub fn fetch_sub(&self, value: T) -> T {
        T::atomic_fetch_sub(self.repr, value, Self::ordering())
    }

    pub fn fetch_and(&self, value: T) -> T {
        T::atomic_fetch_and(self.repr, value, Self::ordering())
    }

    pub fn fetch_or(&self, value: T) -> T {
        T::atomic_fetch_or(self.repr, value, Self::ordering())
    }

    pub fn fetch_xor(&self, value: T) -> T {
        T::atomic_fetch_xor(self.repr, value, Self::ordering())
    }
}
