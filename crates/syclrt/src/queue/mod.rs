//! Submission queues and the dependency engine.
//!
//! A submission goes `Pending → Scheduled → Running → Complete` (or `Failed`). It stays pending
//! until every explicit dependency and every earlier conflicting access to the buffers it uses
//! has finished; only then is it handed to the device's executor.

mod event;
mod handler;
#[allow(clippy::module_inception)]
mod queue;
mod registry;
mod tracker;

pub use event::{Event, EventStatus, ProfilingInfo};
pub use handler::Handler;
pub use queue::{Queue, QueueBuilder};
pub use registry::{KernelDescriptor, KernelKey, KernelRegistry, KernelShape};

pub(crate) use tracker::AccessTracker;
