use std::fmt;
use std::sync::mpsc::{self, Sender};
use std::thread;

use parking_lot::Mutex;
use syclrt_tracing::perf_span;
use tracing::debug;

use super::{
    run_group_lanes, run_job, Executor, ExecutorKind, GroupContext, GroupKernel, ItemKernel, Job, LaneKernel,
    LaunchShape, LocalMemory,
};
use crate::config::RuntimeConfig;
use crate::error::{Error, Result};

/// Runs every command on one dedicated host thread, in submission-ready order.
///
/// Work-items of a kernel run one after another. Barrier-capable work-groups still get a thread
/// per lane, but the lanes take turns so only one of them runs at any moment.
pub struct SequentialExecutor {
    jobs: Mutex<Sender<Job>>,
    lane_stack_size: usize,
}

impl SequentialExecutor {
    pub fn new(config: &RuntimeConfig) -> Result<Self> {
        let (jobs, inbox) = mpsc::channel::<Job>();
        thread::Builder::new()
            .name("sycl-host-worker".to_string())
            .spawn(move || {
                for job in inbox {
                    run_job(job);
                }
                debug!("host worker exiting");
            })
            .map_err(|err| Error::platform(format!("could not start the host worker thread: {err}")))?;

        Ok(Self {
            jobs: Mutex::new(jobs),
            lane_stack_size: config.lane_stack_size,
        })
    }
}

impl fmt::Debug for SequentialExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SequentialExecutor")
            .field("lane_stack_size", &self.lane_stack_size)
            .finish()
    }
}

impl Executor for SequentialExecutor {
    fn kind(&self) -> ExecutorKind {
        ExecutorKind::Sequential
    }

    fn spawn(&self, job: Job) -> Result<()> {
        self.jobs
            .lock()
            .send(job)
            .map_err(|_| Error::runtime("the host worker thread has stopped"))
    }

    fn run_items(&self, shape: &LaunchShape, kernel: &ItemKernel<'_>) -> Result<()> {
        let _span = perf_span!("sequential_run_items", items = shape.work_items());
        for linear in 0..shape.work_items() {
            kernel(shape.item_at(linear));
        }
        Ok(())
    }

    fn run_lanes(&self, shape: &LaunchShape, locals: LocalMemory<'_>, kernel: &LaneKernel<'_>) -> Result<()> {
        let _span = perf_span!(
            "sequential_run_lanes",
            groups = shape.group_count(),
            lanes = shape.lanes_per_group()
        );
        for group in 0..shape.group_count() {
            run_group_lanes(
                shape,
                group,
                locals,
                self.kind().barrier_mode(),
                self.lane_stack_size,
                kernel,
            )?;
        }
        Ok(())
    }

    fn run_groups(&self, shape: &LaunchShape, locals: LocalMemory<'_>, kernel: &GroupKernel<'_>) -> Result<()> {
        let _span = perf_span!("sequential_run_groups", groups = shape.group_count());
        for linear in 0..shape.group_count() {
            let scope = locals.allocate();
            kernel(&GroupContext {
                shape,
                group: shape.group_at(linear),
                scope: &scope,
            });
        }
        Ok(())
    }
}
