//! Devices, platforms and device selection.
//!
//! Host devices are simulated: each is backed by one of the executors in [`crate::backend`],
//! created the first time a queue needs it.

mod platform;
mod selector;

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub use platform::Platform;
pub use selector::{
    accelerator_selector, aspect_selector, cpu_selector, default_selector, gpu_selector, host_selector,
    select_device, Selector,
};

use crate::backend::{create_executor, Executor, ExecutorKind};
use crate::config::RuntimeConfig;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    Host,
    Cpu,
    Gpu,
    Accelerator,
    Custom,
}

/// Optional device capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aspect {
    Host,
    Cpu,
    Gpu,
    Accelerator,
    Custom,
    Fp16,
    Fp64,
    Int64BaseAtomics,
    Int64ExtendedAtomics,
    Image,
    OnlineCompiler,
    OnlineLinker,
    QueueProfiling,
    UsmDeviceAllocations,
    UsmHostAllocations,
    UsmSharedAllocations,
    UsmRestrictedSharedAllocations,
    UsmSystemAllocator,
}

impl Aspect {
    /// Aspects every simulated host device provides, besides its type aspect.
    pub const HOST_FEATURES: [Aspect; 9] = [
        Aspect::Fp16,
        Aspect::Fp64,
        Aspect::Int64BaseAtomics,
        Aspect::Int64ExtendedAtomics,
        Aspect::QueueProfiling,
        Aspect::UsmDeviceAllocations,
        Aspect::UsmHostAllocations,
        Aspect::UsmSharedAllocations,
        Aspect::UsmSystemAllocator,
    ];

    pub fn for_device_type(device_type: DeviceType) -> Aspect {
        match device_type {
            DeviceType::Host => Aspect::Host,
            DeviceType::Cpu => Aspect::Cpu,
            DeviceType::Gpu => Aspect::Gpu,
            DeviceType::Accelerator => Aspect::Accelerator,
            DeviceType::Custom => Aspect::Custom,
        }
    }
}

/// Static description of a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: String,
    pub vendor: String,
    pub device_type: DeviceType,
    pub max_work_group_size: usize,
    pub max_compute_units: usize,
    pub aspects: Vec<Aspect>,
    /// Executor that runs the device's kernels.
    pub executor: ExecutorKind,
}

impl DeviceInfo {
    /// A host-simulated device of `device_type` carrying the standard host feature set.
    pub fn simulated(name: impl Into<String>, device_type: DeviceType, executor: ExecutorKind, config: &RuntimeConfig) -> Self {
        let mut aspects = vec![Aspect::for_device_type(device_type)];
        aspects.extend_from_slice(&Aspect::HOST_FEATURES);
        let max_compute_units = match executor {
            ExecutorKind::Sequential => 1,
            ExecutorKind::Parallel => config.worker_threads.unwrap_or_else(|| {
                std::thread::available_parallelism().map_or(1, |n| n.get())
            }),
        };
        Self {
            name: name.into(),
            vendor: "syclrt".to_string(),
            device_type,
            max_work_group_size: config.max_work_group_size,
            max_compute_units,
            aspects,
            executor,
        }
    }
}

struct DeviceInner {
    info: DeviceInfo,
    config: RuntimeConfig,
    executor: Mutex<Option<Arc<dyn Executor>>>,
}

/// A device queues can submit to. Cloning shares the device and its executor.
#[derive(Clone)]
pub struct Device {
    inner: Arc<DeviceInner>,
}

impl Device {
    pub fn new(info: DeviceInfo, config: RuntimeConfig) -> Self {
        Self {
            inner: Arc::new(DeviceInner {
                info,
                config,
                executor: Mutex::new(None),
            }),
        }
    }

    pub fn info(&self) -> &DeviceInfo {
        &self.inner.info
    }

    pub fn name(&self) -> &str {
        &self.inner.info.name
    }

    pub fn device_type(&self) -> DeviceType {
        self.inner.info.device_type
    }

    pub fn max_work_group_size(&self) -> usize {
        self.inner.info.max_work_group_size
    }

    pub fn has(&self, aspect: Aspect) -> bool {
        self.inner.info.aspects.contains(&aspect)
    }

    pub fn is_host(&self) -> bool {
        self.device_type() == DeviceType::Host
    }

    pub fn is_cpu(&self) -> bool {
        self.device_type() == DeviceType::Cpu
    }

    pub fn is_gpu(&self) -> bool {
        self.device_type() == DeviceType::Gpu
    }

    pub fn is_accelerator(&self) -> bool {
        self.device_type() == DeviceType::Accelerator
    }

    /// The device's executor, started on first use.
    pub(crate) fn executor(&self) -> Result<Arc<dyn Executor>> {
        let mut slot = self.inner.executor.lock();
        if let Some(executor) = slot.as_ref() {
            return Ok(Arc::clone(executor));
        }
        let executor = create_executor(self.inner.info.executor, &self.inner.config)?;
        debug!(device = %self.name(), executor = %self.inner.info.executor, "executor started");
        *slot = Some(Arc::clone(&executor));
        Ok(executor)
    }
}

impl PartialEq for Device {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Device {}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("name", &self.name())
            .field("type", &self.device_type())
            .field("executor", &self.inner.info.executor)
            .finish()
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?}, {})", self.name(), self.device_type(), self.inner.info.executor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulated_devices_carry_host_features() {
        let config = RuntimeConfig::default();
        let info = DeviceInfo::simulated("probe", DeviceType::Gpu, ExecutorKind::Sequential, &config);
        let device = Device::new(info, config);
        assert!(device.is_gpu());
        assert!(device.has(Aspect::Gpu));
        assert!(device.has(Aspect::UsmSharedAllocations));
        assert!(!device.has(Aspect::Image));
        assert_eq!(device.max_work_group_size(), 256);
        assert_eq!(device.info().max_compute_units, 1);
    }

    #[test]
    fn executor_is_created_once() {
        let config = RuntimeConfig::default();
        let device = Device::new(
            DeviceInfo::simulated("once", DeviceType::Host, ExecutorKind::Sequential, &config),
            config,
        );
        let first = device.executor().expect("executor");
        let second = device.clone().executor().expect("executor");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.kind(), ExecutorKind::Sequential);
    }
}
