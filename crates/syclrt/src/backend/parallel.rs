use std::fmt;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use syclrt_tracing::perf_span;

use super::{
    run_group_lanes, run_job, Executor, ExecutorKind, GroupContext, GroupKernel, ItemKernel, Job, LaneKernel,
    LaunchShape, LocalMemory,
};
use crate::config::RuntimeConfig;
use crate::error::{Error, Result};

/// Runs commands on a private rayon pool.
///
/// Work-items and work-groups are spread across the pool. The lanes of a barrier-capable group run
/// on their own threads so a lane blocked at a barrier never holds up a pool worker that another
/// lane of the same group needs.
pub struct ParallelExecutor {
    pool: ThreadPool,
    lane_stack_size: usize,
}

impl ParallelExecutor {
    pub fn new(config: &RuntimeConfig) -> Result<Self> {
        let mut builder = ThreadPoolBuilder::new().thread_name(|index| format!("sycl-worker-{index}"));
        if let Some(threads) = config.worker_threads {
            builder = builder.num_threads(threads);
        }
        let pool = builder
            .build()
            .map_err(|err| Error::platform(format!("could not build the worker pool: {err}")))?;

        Ok(Self {
            pool,
            lane_stack_size: config.lane_stack_size,
        })
    }

    pub fn worker_threads(&self) -> usize {
        self.pool.current_num_threads()
    }
}

impl fmt::Debug for ParallelExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParallelExecutor")
            .field("worker_threads", &self.worker_threads())
            .field("lane_stack_size", &self.lane_stack_size)
            .finish()
    }
}

impl Executor for ParallelExecutor {
    fn kind(&self) -> ExecutorKind {
        ExecutorKind::Parallel
    }

    fn spawn(&self, job: Job) -> Result<()> {
        self.pool.spawn(move || run_job(job));
        Ok(())
    }

    fn run_items(&self, shape: &LaunchShape, kernel: &ItemKernel<'_>) -> Result<()> {
        let _span = perf_span!("parallel_run_items", items = shape.work_items());
        self.pool.install(|| {
            (0..shape.work_items())
                .into_par_iter()
                .for_each(|linear| kernel(shape.item_at(linear)))
        });
        Ok(())
    }

    fn run_lanes(&self, shape: &LaunchShape, locals: LocalMemory<'_>, kernel: &LaneKernel<'_>) -> Result<()> {
        let _span = perf_span!(
            "parallel_run_lanes",
            groups = shape.group_count(),
            lanes = shape.lanes_per_group()
        );
        let mode = self.kind().barrier_mode();
        self.pool.install(|| {
            (0..shape.group_count())
                .into_par_iter()
                .try_for_each(|group| run_group_lanes(shape, group, locals, mode, self.lane_stack_size, kernel))
        })
    }

    fn run_groups(&self, shape: &LaunchShape, locals: LocalMemory<'_>, kernel: &GroupKernel<'_>) -> Result<()> {
        let _span = perf_span!("parallel_run_groups", groups = shape.group_count());
        self.pool.install(|| {
            (0..shape.group_count()).into_par_iter().for_each(|linear| {
                let scope = locals.allocate();
                kernel(&GroupContext {
                    shape,
                    group: shape.group_at(linear),
                    scope: &scope,
                });
            })
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_size_follows_the_config() {
        let config = RuntimeConfig {
            worker_threads: Some(3),
            ..RuntimeConfig::default()
        };
        let executor = ParallelExecutor::new(&config).expect("pool");
        assert_eq!(executor.worker_threads(), 3);
        assert_eq!(executor.kind(), ExecutorKind::Parallel);
    }
}
