use std::sync::OnceLock;

use tracing::{debug, warn};

use super::{Aspect, Device, DeviceInfo, DeviceType};
use crate::backend::ExecutorKind;
use crate::config::{ExecutorPreference, RuntimeConfig};

/// A set of devices exposed together.
#[derive(Debug, Clone)]
pub struct Platform {
    name: String,
    vendor: String,
    devices: Vec<Device>,
}

static DEFAULT_PLATFORM: OnceLock<Platform> = OnceLock::new();

impl Platform {
    pub fn new(name: impl Into<String>, vendor: impl Into<String>, devices: Vec<Device>) -> Self {
        Self {
            name: name.into(),
            vendor: vendor.into(),
            devices,
        }
    }

    /// The host platform: a `Host` device followed by a `Cpu` device.
    ///
    /// Under [`ExecutorPreference::Auto`] the host device runs sequentially and the CPU device in
    /// parallel; an explicit preference backs both devices with that executor.
    pub fn host(config: &RuntimeConfig) -> Self {
        let (host, cpu) = match config.executor {
            ExecutorPreference::Auto => (ExecutorKind::Sequential, ExecutorKind::Parallel),
            ExecutorPreference::Sequential => (ExecutorKind::Sequential, ExecutorKind::Sequential),
            ExecutorPreference::Parallel => (ExecutorKind::Parallel, ExecutorKind::Parallel),
        };
        let devices = vec![
            Device::new(DeviceInfo::simulated("host", DeviceType::Host, host, config), config.clone()),
            Device::new(DeviceInfo::simulated("cpu", DeviceType::Cpu, cpu, config), config.clone()),
        ];
        debug!(executor = ?config.executor, devices = devices.len(), "host platform created");
        Self::new("syclrt host platform", "syclrt", devices)
    }

    /// Process-wide host platform configured from the environment.
    pub fn default_platform() -> &'static Platform {
        DEFAULT_PLATFORM.get_or_init(|| {
            let config = RuntimeConfig::from_env().unwrap_or_else(|err| {
                warn!(error = %err, "ignoring invalid runtime configuration from the environment");
                RuntimeConfig::default()
            });
            Platform::host(&config)
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn vendor(&self) -> &str {
        &self.vendor
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn devices_of(&self, device_type: DeviceType) -> Vec<Device> {
        self.devices
            .iter()
            .filter(|device| device.device_type() == device_type)
            .cloned()
            .collect()
    }

    /// True when every device of the platform has `aspect`.
    pub fn has(&self, aspect: Aspect) -> bool {
        !self.devices.is_empty() && self.devices.iter().all(|device| device.has(aspect))
    }
}
