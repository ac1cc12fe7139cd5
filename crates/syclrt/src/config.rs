//! Runtime configuration.
//!
//! Decides, once and up front, which executor backs the devices of the host platform and which
//! capability limits those devices report.

use std::env;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Executor override read from `SYCLRT_EXECUTOR` (`auto`, `sequential`, `parallel`).
pub const EXECUTOR_VAR: &str = "SYCLRT_EXECUTOR";
/// Work-group size limit read from `SYCLRT_MAX_WORK_GROUP_SIZE`.
pub const MAX_WORK_GROUP_SIZE_VAR: &str = "SYCLRT_MAX_WORK_GROUP_SIZE";
/// Worker thread count of the parallel executor, read from `SYCLRT_WORKER_THREADS`.
pub const WORKER_THREADS_VAR: &str = "SYCLRT_WORKER_THREADS";
/// Stack size of lane threads in KiB, read from `SYCLRT_LANE_STACK_KB`.
pub const LANE_STACK_VAR: &str = "SYCLRT_LANE_STACK_KB";

/// Which executors back the devices of the host platform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutorPreference {
    /// Sequential host device, parallel CPU device.
    #[default]
    Auto,
    /// Every device runs sequentially.
    Sequential,
    /// Every device runs in parallel.
    Parallel,
}

impl ExecutorPreference {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "auto" => Some(Self::Auto),
            "sequential" | "host" => Some(Self::Sequential),
            "parallel" | "cpu" => Some(Self::Parallel),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub executor: ExecutorPreference,
    /// Largest work-group the devices accept.
    pub max_work_group_size: usize,
    /// Threads in the parallel executor's pool; `None` lets rayon decide.
    pub worker_threads: Option<usize>,
    /// Stack size of each lane thread spawned for barrier-capable work-groups.
    pub lane_stack_size: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            executor: ExecutorPreference::Auto,
            max_work_group_size: 256,
            worker_threads: None,
            lane_stack_size: 256 * 1024,
        }
    }
}

impl RuntimeConfig {
    pub fn sequential() -> Self {
        Self {
            executor: ExecutorPreference::Sequential,
            ..Self::default()
        }
    }

    pub fn parallel() -> Self {
        Self {
            executor: ExecutorPreference::Parallel,
            ..Self::default()
        }
    }

    /// Defaults overridden by the `SYCLRT_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(value) = env::var(EXECUTOR_VAR) {
            config.executor = ExecutorPreference::parse(&value)
                .ok_or_else(|| Error::invalid_parameter(format!("{EXECUTOR_VAR}: unknown executor `{value}`")))?;
        }
        if let Ok(value) = env::var(MAX_WORK_GROUP_SIZE_VAR) {
            config.max_work_group_size = parse_usize(MAX_WORK_GROUP_SIZE_VAR, &value)?;
        }
        if let Ok(value) = env::var(WORKER_THREADS_VAR) {
            config.worker_threads = Some(parse_usize(WORKER_THREADS_VAR, &value)?);
        }
        if let Ok(value) = env::var(LANE_STACK_VAR) {
            config.lane_stack_size = parse_usize(LANE_STACK_VAR, &value)? * 1024;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|err| Error::invalid_parameter(format!("runtime config: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|err| Error::runtime(format!("runtime config: {err}")))
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_work_group_size == 0 {
            return Err(Error::invalid_parameter("max_work_group_size must be at least 1"));
        }
        if self.worker_threads == Some(0) {
            return Err(Error::invalid_parameter("worker_threads must be at least 1"));
        }
        if self.lane_stack_size < 16 * 1024 {
            return Err(Error::invalid_parameter("lane_stack_size must be at least 16 KiB"));
        }
        Ok(())
    }
}

fn parse_usize(var: &str, value: &str) -> Result<usize> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::invalid_parameter(format!("{var}: expected an unsigned integer, got `{value}`")))
}
