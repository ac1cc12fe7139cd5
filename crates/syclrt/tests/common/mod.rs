#![allow(dead_code)]

use syclrt::{Platform, Queue, Result, RuntimeConfig};
use syclrt_tracing::{init_global_tracing, TracingConfig, TracingProfile};

/// Runtime logs go to the test harness capture; `SYCLRT_TRACING_*` variables still apply.
pub fn init_tracing() {
    let mut config = TracingConfig::preset(TracingProfile::Test);
    config.apply_env();
    // Only the first call per test binary installs anything.
    let _ = init_global_tracing(&config);
}

/// One queue per device of a fresh host platform: the sequential host device first, then the
/// parallel CPU device.
pub fn queues() -> Result<Vec<Queue>> {
    queues_with(&RuntimeConfig {
        worker_threads: Some(4),
        ..RuntimeConfig::default()
    })
}

pub fn queues_with(config: &RuntimeConfig) -> Result<Vec<Queue>> {
    init_tracing();
    Platform::host(config)
        .devices()
        .iter()
        .map(|device| Queue::builder(device.clone()).build())
        .collect()
}
