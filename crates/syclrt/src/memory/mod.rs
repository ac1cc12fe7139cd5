//! Memory regions and the views kernels and the host use to reach them.

mod access;
mod accessor;
mod buffer;
mod element;
mod host;
mod local;
mod pointer;
pub(crate) mod storage;
mod usm;

pub use access::{AccessDescriptor, AccessMode, AccessRange, AccessTarget, AddressSpace};
pub use accessor::Accessor;
pub use buffer::Buffer;
pub use element::{Element, ElementKind};
pub use host::HostAccessor;
pub use local::{GroupScope, LocalAccessor, LocalDecl, LocalView, WorkGroupScope};
pub use pointer::{ElementPtr, GlobalPtr, LocalPtr};
pub use usm::SharedAllocation;

pub(crate) use pointer::strided_copy;
