use std::fmt;

use super::{Id, Range};
use crate::error::{Error, Result};

/// A global index space split into equally sized work-groups, with an optional offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NdRange<const N: usize> {
    global: Range<N>,
    local: Range<N>,
    offset: Id<N>,
}

impl<const N: usize> NdRange<N> {
    pub fn new(global: Range<N>, local: Range<N>) -> Self {
        Self::with_offset(global, local, Id::zero())
    }

    pub fn with_offset(global: Range<N>, local: Range<N>, offset: Id<N>) -> Self {
        Self { global, local, offset }
    }

    pub fn global_range(&self) -> Range<N> {
        self.global
    }

    pub fn local_range(&self) -> Range<N> {
        self.local
    }

    pub fn offset(&self) -> Id<N> {
        self.offset
    }

    /// Work-groups per dimension. Only meaningful once [`NdRange::validate`] succeeds.
    pub fn group_range(&self) -> Range<N> {
        self.global / self.local
    }

    /// Every local extent must be non-zero and divide the matching global extent.
    pub fn validate(&self) -> Result<()> {
        for k in 0..N {
            let (global, local) = (self.global.get(k), self.local.get(k));
            if local == 0 {
                return Err(Error::nd_range(format!("local range {} has a zero extent in dimension {k}", self.local)));
            }
            if global % local != 0 {
                return Err(Error::nd_range(format!(
                    "global range {} is not divisible by local range {} in dimension {k} ({global} % {local} != 0)",
                    self.global, self.local
                )));
            }
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

impl<const N: usize> fmt::Display for NdRange<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "nd_range(global={}, local={}, offset={})", self.global, self.local, self.offset)
    }
}
