use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use super::{Aspect, Device, DeviceType, Platform};
use crate::error::{Error, Result};

type ScoreFn = dyn Fn(&Device) -> i32 + Send + Sync;

/// Scores candidate devices; the highest strictly positive score wins.
///
/// Clones share the cached choice. Each factory call returns an independent selector.
#[derive(Clone)]
pub struct Selector {
    name: String,
    score: Arc<ScoreFn>,
    cache: Arc<Mutex<Option<Device>>>,
}

impl Selector {
    pub fn new(score: impl Fn(&Device) -> i32 + Send + Sync + 'static) -> Self {
        Self::named("custom_selector", score)
    }

    pub fn named(name: impl Into<String>, score: impl Fn(&Device) -> i32 + Send + Sync + 'static) -> Self {
        Self {
            name: name.into(),
            score: Arc::new(score),
            cache: Arc::new(Mutex::new(None)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn score(&self, device: &Device) -> i32 {
        (self.score)(device)
    }

    /// Choose from the default platform, remembering the choice.
    pub fn select(&self) -> Result<Device> {
        self.select_cached(Platform::default_platform())
    }

    /// Like [`Selector::select`] but scoring `platform` when nothing is cached yet.
    pub fn select_cached(&self, platform: &Platform) -> Result<Device> {
        let mut cache = self.cache.lock();
        if let Some(device) = cache.as_ref() {
            return Ok(device.clone());
        }
        let device = self.select_from(platform)?;
        *cache = Some(device.clone());
        Ok(device)
    }

    /// Choose from `platform` without touching the cache. Ties go to the earlier device.
    pub fn select_from(&self, platform: &Platform) -> Result<Device> {
        let mut best: Option<(i32, &Device)> = None;
        for device in platform.devices() {
            let score = self.score(device);
            debug!(selector = %self.name, device = %device, score, "scored device");
            if score > 0 && best.map_or(true, |(top, _)| score > top) {
                best = Some((score, device));
            }
        }
        match best {
            Some((score, device)) => {
                debug!(selector = %self.name, device = %device, score, "device selected");
                Ok(device.clone())
            }
            None => Err(Error::runtime(format!(
                "no device of platform `{}` is accepted by {}",
                platform.name(),
                self.name
            ))),
        }
    }
}

impl fmt::Debug for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Selector").field("name", &self.name).finish()
    }
}

/// Run `selector` against the default platform.
pub fn select_device(selector: &Selector) -> Result<Device> {
    selector.select()
}

/// Prefers accelerators, then CPUs, then the host device.
pub fn default_selector() -> Selector {
    Selector::named("default_selector", |device| match device.device_type() {
        DeviceType::Gpu => 500,
        DeviceType::Accelerator => 400,
        DeviceType::Cpu => 300,
        DeviceType::Host => 100,
        DeviceType::Custom => -1,
    })
}

fn type_selector(name: &str, wanted: DeviceType) -> Selector {
    Selector::named(name, move |device| if device.device_type() == wanted { 1000 } else { -1 })
}

pub fn host_selector() -> Selector {
    type_selector("host_selector", DeviceType::Host)
}

pub fn cpu_selector() -> Selector {
    type_selector("cpu_selector", DeviceType::Cpu)
}

pub fn gpu_selector() -> Selector {
    type_selector("gpu_selector", DeviceType::Gpu)
}

pub fn accelerator_selector() -> Selector {
    type_selector("accelerator_selector", DeviceType::Accelerator)
}

/// Accepts devices having every `required` aspect and none of the `denied` ones, ranked like
/// [`default_selector`].
pub fn aspect_selector(required: &[Aspect], denied: &[Aspect]) -> Selector {
    let required = required.to_vec();
    let denied = denied.to_vec();
    let ranking = default_selector();
    Selector::named("aspect_selector", move |device| {
        let accepted =
            required.iter().all(|&aspect| device.has(aspect)) && !denied.iter().any(|&aspect| device.has(aspect));
        if accepted {
            ranking.score(device).max(1)
        } else {
            -1
        }
    })
}
