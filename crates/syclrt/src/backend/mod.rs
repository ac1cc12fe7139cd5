//! Executors: where command groups and their kernels actually run.
//!
//! A device owns one executor. The queue hands it one [`Job`] per ready command; the job then
//! drives the kernel through one of the `run_*` entry points, which own the decomposition of the
//! launch into work-items, lanes or work-groups.
//!
//! ```text
//!   Queue ──spawn(job)──▶ Executor ──run_items──▶ kernel(global id)
//!                                  ──run_lanes──▶ kernel(&LaneContext)   one thread per lane
//!                                  ──run_groups─▶ kernel(&GroupContext)  one call per group
//! ```

mod barrier;
mod parallel;
mod sequential;
mod types;

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

pub use barrier::{BarrierMode, GroupBarrier, LaneGuard};
pub use parallel::ParallelExecutor;
pub use sequential::SequentialExecutor;
pub use types::{GroupContext, LaneContext, LaunchShape};

use crate::config::RuntimeConfig;
use crate::error::{Error, Result};
use crate::index::IndexArray;
use crate::memory::{GroupScope, LocalDecl};

/// A unit of work handed to an executor.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Kernel body invoked once per work-item with its global id, launch offset not applied.
pub type ItemKernel<'k> = dyn Fn(IndexArray) + Sync + 'k;

/// Kernel body invoked once per lane of a barrier-capable work-group.
pub type LaneKernel<'k> = dyn for<'c> Fn(&LaneContext<'c>) + Sync + 'k;

/// Kernel body invoked once per work-group.
pub type GroupKernel<'k> = dyn for<'c> Fn(&GroupContext<'c>) + Sync + 'k;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutorKind {
    /// One host worker thread; work-groups run one after another.
    Sequential,
    /// A rayon pool; work-items and work-groups run concurrently.
    Parallel,
}

impl ExecutorKind {
    pub fn barrier_mode(self) -> BarrierMode {
        match self {
            ExecutorKind::Sequential => BarrierMode::Lockstep,
            ExecutorKind::Parallel => BarrierMode::Parallel,
        }
    }
}

impl fmt::Display for ExecutorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutorKind::Sequential => f.write_str("sequential"),
            ExecutorKind::Parallel => f.write_str("parallel"),
        }
    }
}

/// Local memory declared by the command group being launched.
#[derive(Debug, Clone, Copy)]
pub struct LocalMemory<'a> {
    pub command: u64,
    pub decls: &'a [LocalDecl],
}

impl LocalMemory<'_> {
    pub fn none() -> LocalMemory<'static> {
        LocalMemory { command: 0, decls: &[] }
    }

    pub(crate) fn allocate(&self) -> GroupScope {
        GroupScope::allocate(self.command, self.decls)
    }
}

pub trait Executor: Send + Sync + fmt::Debug {
    fn kind(&self) -> ExecutorKind;

    /// Run `job` asynchronously.
    fn spawn(&self, job: Job) -> Result<()>;

    fn run_items(&self, shape: &LaunchShape, kernel: &ItemKernel<'_>) -> Result<()>;

    fn run_lanes(&self, shape: &LaunchShape, locals: LocalMemory<'_>, kernel: &LaneKernel<'_>) -> Result<()>;

    fn run_groups(&self, shape: &LaunchShape, locals: LocalMemory<'_>, kernel: &GroupKernel<'_>) -> Result<()>;
}

/// Build the executor of the given kind.
pub fn create_executor(kind: ExecutorKind, config: &RuntimeConfig) -> Result<Arc<dyn Executor>> {
    Ok(match kind {
        ExecutorKind::Sequential => Arc::new(SequentialExecutor::new(config)?),
        ExecutorKind::Parallel => Arc::new(ParallelExecutor::new(config)?),
    })
}

/// Run every lane of work-group `group_linear` on its own thread, blocking until all have
/// finished. A panicking lane is re-raised on the caller once the group has drained.
pub(crate) fn run_group_lanes(
    shape: &LaunchShape,
    group_linear: usize,
    locals: LocalMemory<'_>,
    mode: BarrierMode,
    stack_size: usize,
    kernel: &LaneKernel<'_>,
) -> Result<()> {
    let group = shape.group_at(group_linear);
    let lanes = shape.lanes_per_group();
    let scope = locals.allocate();
    let barrier = GroupBarrier::new(lanes, mode);

    let run_lane = |lane: usize| {
        let _guard = barrier.enter(lane);
        let context = LaneContext {
            shape,
            group,
            local: shape.lane_at(lane),
            lane,
            barrier: &barrier,
            scope: &scope,
        };
        kernel(&context);
    };

    if lanes == 1 {
        run_lane(0);
        return Ok(());
    }

    let run_lane = &run_lane;
    let mut spawn_error = None;
    let mut first_panic = None;
    thread::scope(|s| {
        let mut handles = Vec::with_capacity(lanes);
        for lane in 0..lanes {
            let spawned = thread::Builder::new()
                .name(format!("sycl-lane-{lane}"))
                .stack_size(stack_size)
                .spawn_scoped(s, move || run_lane(lane));
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(err) => {
                    for unspawned in lane..lanes {
                        barrier.retire(unspawned);
                    }
                    spawn_error = Some(Error::runtime(format!(
                        "could not start lane {lane} of work-group {group}: {err}"
                    )));
                    break;
                }
            }
        }
        for handle in handles {
            if let Err(payload) = handle.join() {
                first_panic.get_or_insert(payload);
            }
        }
    });

    if let Some(payload) = first_panic {
        panic::resume_unwind(payload);
    }
    spawn_error.map_or(Ok(()), Err)
}

/// Run `job`, logging instead of unwinding if it panics.
pub(crate) fn run_job(job: Job) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        tracing::error!(%message, "executor job panicked");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;

    use super::*;
    use crate::index::Range;
    use crate::memory::LocalAccessor;

    fn executors() -> Vec<Arc<dyn Executor>> {
        let config = RuntimeConfig {
            worker_threads: Some(2),
            ..RuntimeConfig::default()
        };
        vec![
            create_executor(ExecutorKind::Sequential, &config).expect("sequential executor"),
            create_executor(ExecutorKind::Parallel, &config).expect("parallel executor"),
        ]
    }

    #[test]
    fn spawned_jobs_run() {
        for executor in executors() {
            let (tx, rx) = mpsc::channel();
            executor.spawn(Box::new(move || tx.send(7).expect("receiver alive"))).expect("spawn");
            assert_eq!(rx.recv().expect("job ran"), 7, "{}", executor.kind());
        }
    }

    #[test]
    fn every_item_runs_once() {
        for executor in executors() {
            let shape = LaunchShape::basic(2, IndexArray::new(4, 5, 1), IndexArray::splat(0));
            let hits: Vec<AtomicUsize> = (0..20).map(|_| AtomicUsize::new(0)).collect();
            executor
                .run_items(&shape, &|id| {
                    hits[id.linearize(&shape.global)].fetch_add(1, Ordering::Relaxed);
                })
                .expect("run items");
            assert!(hits.iter().all(|h| h.load(Ordering::Relaxed) == 1), "{}", executor.kind());
        }
    }

    #[test]
    fn lanes_share_local_memory_across_a_barrier() {
        for executor in executors() {
            let shape = LaunchShape::nd(1, IndexArray::new(8, 1, 1), IndexArray::new(4, 1, 1), IndexArray::splat(0));
            let decls = [LocalDecl::new::<u32>(4)];
            let scratch = LocalAccessor::<u32, 1>::new(9, 0, Range::new([4]));
            let sums: Vec<AtomicUsize> = (0..2).map(|_| AtomicUsize::new(0)).collect();

            executor
                .run_lanes(&shape, LocalMemory { command: 9, decls: &decls }, &|lane: &LaneContext<'_>| {
                    let view = scratch.bind(lane);
                    view.write(lane.lane, lane.global()[0] as u32);
                    lane.barrier.wait(lane.lane);
                    if lane.is_leader() {
                        let total: u32 = (0..4usize).map(|i| view.read(i)).sum();
                        sums[lane.group[0]].store(total as usize, Ordering::Relaxed);
                    }
                })
                .expect("run lanes");

            assert_eq!(sums[0].load(Ordering::Relaxed), 6, "{}", executor.kind());
            assert_eq!(sums[1].load(Ordering::Relaxed), 22, "{}", executor.kind());
        }
    }

    #[test]
    fn groups_run_once_each() {
        for executor in executors() {
            let shape = LaunchShape::hierarchical(2, IndexArray::new(2, 3, 1), IndexArray::new(2, 2, 1));
            let count = AtomicUsize::new(0);
            executor
                .run_groups(&shape, LocalMemory::none(), &|_group: &GroupContext<'_>| {
                    count.fetch_add(1, Ordering::Relaxed);
                })
                .expect("run groups");
            assert_eq!(count.load(Ordering::Relaxed), 6);
        }
    }

    #[test]
    #[should_panic(expected = "lane failure")]
    fn lane_panics_reach_the_caller() {
        let shape = LaunchShape::nd(1, IndexArray::new(4, 1, 1), IndexArray::new(4, 1, 1), IndexArray::splat(0));
        let _ = run_group_lanes(&shape, 0, LocalMemory::none(), BarrierMode::Parallel, 64 * 1024, &|lane: &LaneContext<'_>| {
            if lane.lane == 2 {
                panic!("lane failure");
            }
            lane.barrier.wait(lane.lane);
        });
    }
}
