//! Shared surface of [`super::Id`] and [`super::Range`]: construction, slot access, equality over
//! the logical dimensions and the component-wise operators.

macro_rules! index_value {
    (@binary $ty:ident; $($op:ident, $method:ident, $assign_op:ident, $assign_method:ident, $f:expr;)+) => {
        $(
            impl<const N: usize> std::ops::$op for $ty<N> {
                type Output = Self;

                fn $method(self, rhs: Self) -> Self {
                    self.zip_slots(rhs, $f)
                }
            }

            impl<const N: usize> std::ops::$op<usize> for $ty<N> {
                type Output = Self;

                fn $method(self, rhs: usize) -> Self {
                    let f = $f;
                    self.map_slots(|a| f(a, rhs))
                }
            }

            impl<const N: usize> std::ops::$assign_op for $ty<N> {
                fn $assign_method(&mut self, rhs: Self) {
                    *self = std::ops::$op::$method(*self, rhs);
                }
            }

            impl<const N: usize> std::ops::$assign_op<usize> for $ty<N> {
                fn $assign_method(&mut self, rhs: usize) {
                    *self = std::ops::$op::$method(*self, rhs);
                }
            }
        )+
    };

    ($ty:ident, $fill:expr) => {
        impl<const N: usize> $ty<N> {
            /// Slot value used past the logical dimension count.
            pub const FILL: usize = $fill;

            pub fn new(coords: [usize; N]) -> Self {
                let () = $crate::index::Dims::<N>::VALID;
                Self {
                    slots: $crate::index::IndexArray::from_leading(&coords, $fill),
                }
            }

            /// Keep the first `N` slots of `slots`, resetting the rest.
            pub fn from_index_array(slots: $crate::index::IndexArray) -> Self {
                let () = $crate::index::Dims::<N>::VALID;
                let all = slots.to_array();
                Self {
                    slots: $crate::index::IndexArray::from_leading(&all[..N], $fill),
                }
            }

            pub const fn dimensions(&self) -> usize {
                N
            }

            pub fn as_index_array(&self) -> $crate::index::IndexArray {
                self.slots
            }

            pub fn to_array(&self) -> [usize; N] {
                let all = self.slots.to_array();
                std::array::from_fn(|k| all[k])
            }

            /// Value of a logical dimension.
            pub fn get(&self, dimension: usize) -> usize {
                assert!(dimension < N, "dimension {dimension} out of range for a {N}-dimensional value");
                self.slots[dimension]
            }

            fn map_slots(self, f: impl Fn(usize) -> usize) -> Self {
                self.zip_slots(self, |a, _| f(a))
            }

            fn zip_slots(self, rhs: Self, f: impl Fn(usize, usize) -> usize) -> Self {
                Self {
                    slots: self.slots.zip_with(rhs.slots, N, $fill, f),
                }
            }

            pub fn cmp_eq(self, rhs: Self) -> Self {
                self.zip_slots(rhs, |a, b| usize::from(a == b))
            }

            pub fn cmp_ne(self, rhs: Self) -> Self {
                self.zip_slots(rhs, |a, b| usize::from(a != b))
            }

            pub fn cmp_lt(self, rhs: Self) -> Self {
                self.zip_slots(rhs, |a, b| usize::from(a < b))
            }

            pub fn cmp_le(self, rhs: Self) -> Self {
                self.zip_slots(rhs, |a, b| usize::from(a <= b))
            }

            pub fn cmp_gt(self, rhs: Self) -> Self {
                self.zip_slots(rhs, |a, b| usize::from(a > b))
            }

            pub fn cmp_ge(self, rhs: Self) -> Self {
                self.zip_slots(rhs, |a, b| usize::from(a >= b))
            }
        }

        impl<const N: usize> std::ops::Index<usize> for $ty<N> {
            type Output = usize;

            fn index(&self, dimension: usize) -> &usize {
                debug_assert!(dimension < N, "dimension {dimension} out of range for a {N}-dimensional value");
                &self.slots[dimension]
            }
        }

        impl<const N: usize> std::ops::IndexMut<usize> for $ty<N> {
            fn index_mut(&mut self, dimension: usize) -> &mut usize {
                debug_assert!(dimension < N, "dimension {dimension} out of range for a {N}-dimensional value");
                &mut self.slots[dimension]
            }
        }

        impl<const N: usize> PartialEq for $ty<N> {
            fn eq(&self, other: &Self) -> bool {
                self.slots.is_equal(&other.slots, N)
            }
        }

        impl<const N: usize> Eq for $ty<N> {}

        impl<const N: usize> std::hash::Hash for $ty<N> {
            fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
                std::hash::Hash::hash(&self.to_array(), state);
            }
        }

        impl<const N: usize> std::fmt::Debug for $ty<N> {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}{:?}", stringify!($ty), self.to_array())
            }
        }

        impl<const N: usize> std::fmt::Display for $ty<N> {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                let parts: Vec<String> = self.to_array().iter().map(usize::to_string).collect();
                write!(f, "({})", parts.join(", "))
            }
        }

        impl<const N: usize> From<[usize; N]> for $ty<N> {
            fn from(coords: [usize; N]) -> Self {
                Self::new(coords)
            }
        }

        impl From<usize> for $ty<1> {
            fn from(value: usize) -> Self {
                Self::new([value])
            }
        }

        index_value!(@binary $ty;
            Add, add, AddAssign, add_assign, |a: usize, b: usize| a.wrapping_add(b);
            Sub, sub, SubAssign, sub_assign, |a: usize, b: usize| a.wrapping_sub(b);
            Mul, mul, MulAssign, mul_assign, |a: usize, b: usize| a.wrapping_mul(b);
            Div, div, DivAssign, div_assign, |a: usize, b: usize| a / b;
            Rem, rem, RemAssign, rem_assign, |a: usize, b: usize| a % b;
            Shl, shl, ShlAssign, shl_assign, |a: usize, b: usize| a << b;
            Shr, shr, ShrAssign, shr_assign, |a: usize, b: usize| a >> b;
            BitAnd, bitand, BitAndAssign, bitand_assign, |a: usize, b: usize| a & b;
            BitOr, bitor, BitOrAssign, bitor_assign, |a: usize, b: usize| a | b;
            BitXor, bitxor, BitXorAssign, bitxor_assign, |a: usize, b: usize| a ^ b;
        );
    };
}
