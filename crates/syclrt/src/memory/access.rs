//! Access intent descriptors: what a kernel or host view wants to do with which part of a
//! memory region.

use std::fmt;

use super::ElementKind;
use crate::index::IndexArray;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessMode {
    Read,
    Write,
    ReadWrite,
    /// Write without caring about the prior contents.
    DiscardWrite,
    /// Read-write without caring about the prior contents.
    DiscardReadWrite,
    Atomic,
}

impl AccessMode {
    pub const fn can_read(self) -> bool {
        !matches!(self, AccessMode::Write | AccessMode::DiscardWrite)
    }

    pub const fn can_write(self) -> bool {
        !matches!(self, AccessMode::Read)
    }

    pub const fn is_discard(self) -> bool {
        matches!(self, AccessMode::DiscardWrite | AccessMode::DiscardReadWrite)
    }

    /// Two accesses to overlapping elements must be ordered when either one may write.
    pub const fn conflicts_with(self, other: AccessMode) -> bool {
        self.can_write() || other.can_write()
    }
}

/// Where an accessor points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessTarget {
    GlobalBuffer,
    ConstantBuffer,
    Local,
    HostBuffer,
    Image,
    ImageArray,
    HostImage,
}

impl AccessTarget {
    pub const fn is_image(self) -> bool {
        matches!(self, AccessTarget::Image | AccessTarget::ImageArray | AccessTarget::HostImage)
    }

    pub const fn address_space(self) -> AddressSpace {
        match self {
            AccessTarget::ConstantBuffer => AddressSpace::Constant,
            AccessTarget::Local => AddressSpace::Local,
            _ => AddressSpace::Global,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressSpace {
    Global,
    Local,
    Private,
    Constant,
}

/// An offset and extent inside a region, always three slots wide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AccessRange {
    pub offset: IndexArray,
    pub range: IndexArray,
}

impl AccessRange {
    pub fn new(offset: IndexArray, range: IndexArray) -> Self {
        Self { offset, range }
    }

    /// The whole of a region of extent `range`.
    pub fn full(range: IndexArray) -> Self {
        Self::new(IndexArray::splat(0), range)
    }

    /// Exclusive upper corner.
    pub fn end(&self) -> IndexArray {
        IndexArray::new(
            self.offset[0] + self.range[0],
            self.offset[1] + self.range[1],
            self.offset[2] + self.range[2],
        )
    }

    /// Dimensions that matter for addressing. A trailing dimension collapses only when its
    /// extent is 1 and its offset is 0; the third dimension is examined first, so a
    /// non-trivial third dimension keeps all three.
    pub fn num_dimensions(&self) -> usize {
        let is_point = |k: usize| self.range[k] == 1 && self.offset[k] == 0;
        match (is_point(1), is_point(2)) {
            (true, true) => 1,
            (false, true) => 2,
            (_, false) => 3,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.range.count() == 0
    }

    /// True when the two boxes share at least one element.
    pub fn overlaps(&self, other: &AccessRange) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        let (a_end, b_end) = (self.end(), other.end());
        (0..3).all(|k| self.offset[k] < b_end[k] && other.offset[k] < a_end[k])
    }

    /// True when this box lies inside a region of extent `bounds`.
    pub fn fits_within(&self, bounds: &IndexArray) -> bool {
        let end = self.end();
        (0..3).all(|k| end[k] <= bounds[k])
    }
}

impl fmt::Display for AccessRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "offset {} range {}", self.offset, self.range)
    }
}

/// Runtime description of one accessor argument of a kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AccessDescriptor {
    pub element: ElementKind,
    pub dims: usize,
    pub mode: AccessMode,
    pub target: AccessTarget,
}
