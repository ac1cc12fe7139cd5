//! # syclrt - host-side kernel dispatch runtime
//!
//! Runs data-parallel kernels on the host following the SYCL execution model: index spaces,
//! work-groups with barriers and local memory, buffers whose accesses order submissions, and
//! queues that report kernel failures asynchronously.
//!
//! ## Architecture
//!
//! - **Index spaces**: [`Id`], [`Range`] and [`NdRange`] of one to three dimensions.
//! - **Memory**: [`Buffer`]s own their data; kernels reach it through [`Accessor`]s requested on a
//!   [`Handler`], and the host through a [`HostAccessor`]. [`SharedAllocation`]s are shared
//!   memory ordered only by explicit events.
//! - **Queues**: [`Queue::submit`] turns a command group into an [`Event`]. Submissions wait for
//!   their explicit dependencies and for earlier conflicting accesses to the same buffer region.
//! - **Executors**: each [`Device`] dispatches through a sequential executor (one worker thread,
//!   lanes of a group take turns at barriers) or a parallel one (a rayon pool, one scoped thread
//!   per lane of a barrier-capable group).
//!
//! ## Example
//!
//! ```no_run
//! use syclrt::{default_selector, AccessMode, Buffer, Queue, Range};
//!
//! # fn main() -> syclrt::Result<()> {
//! let queue = Queue::new(&default_selector())?;
//! let mut data = vec![1i32; 1024];
//! {
//!     let buffer = Buffer::from_host(&mut data);
//!     queue.submit(|h| {
//!         let acc = buffer.access(h, AccessMode::ReadWrite)?;
//!         h.parallel_for(Range::new([1024]), move |item| acc.update(item, |v| v * 2))
//!     })?;
//! }
//! assert!(data.iter().all(|&v| v == 2));
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`index`] - ids, ranges and nd-ranges
//! - [`item`] - the per-work-item views handed to kernels
//! - [`memory`] - buffers, accessors, local memory and shared allocations
//! - [`queue`] - queues, handlers, events and the kernel registry
//! - [`backend`] - the executors behind each device
//! - [`device`] - devices, platforms and selectors
//! - [`algorithm`] - tree reduction
//! - [`flow`] - task graphs of command groups

pub mod algorithm;
pub mod atomic;
pub mod backend;
pub mod config;
pub mod device;
pub mod error;
pub mod flow;
pub mod index;
pub mod item;
pub mod memory;
pub mod queue;

pub use algorithm::{is_power_of_two, tree_reduce};
pub use atomic::{Atomic, AtomicElement, AtomicInteger, MemoryOrder};
pub use backend::{Executor, ExecutorKind};
pub use config::{ExecutorPreference, RuntimeConfig};
pub use device::{
    accelerator_selector, aspect_selector, cpu_selector, default_selector, gpu_selector, host_selector,
    select_device, Aspect, Device, DeviceInfo, DeviceType, Platform, Selector,
};
pub use error::{AsyncHandler, Error, ErrorBranch, ErrorKind, ExceptionList, Result, SourceLocation};
pub use flow::{FlowRun, TaskFlow, TaskId};
pub use index::{Id, IndexArray, NdRange, Range};
pub use item::{group_barrier, DeviceEvent, FenceSpace, Group, HItem, Item, NdItem};
pub use memory::{
    AccessDescriptor, AccessMode, AccessRange, AccessTarget, Accessor, AddressSpace, Buffer, Element, ElementKind,
    GlobalPtr, HostAccessor, LocalAccessor, LocalPtr, LocalView, SharedAllocation,
};
pub use queue::{Event, EventStatus, Handler, KernelDescriptor, KernelKey, KernelRegistry, KernelShape, ProfilingInfo, Queue, QueueBuilder};
