//! Kernel registry
//!
//! Every kernel a queue launches is registered once under a key made of its name, its launch
//! shape and its dimensionality. The registry stands where a device compiler's kernel table
//! would: a stable mapping from a kernel's name/type tag to a descriptor of what it accesses.
//! Names default to the kernel closure's type name, which is unique per closure.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::memory::AccessDescriptor;

/// How a kernel is launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KernelShape {
    SingleTask,
    Basic,
    NdRange,
    Hierarchical,
    Fill,
    Copy,
}

impl fmt::Display for KernelShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            KernelShape::SingleTask => "single_task",
            KernelShape::Basic => "parallel_for",
            KernelShape::NdRange => "parallel_for_nd",
            KernelShape::Hierarchical => "parallel_for_work_group",
            KernelShape::Fill => "fill",
            KernelShape::Copy => "copy",
        };
        f.write_str(name)
    }
}

/// Registry key of a kernel.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KernelKey {
    pub name: String,
    pub shape: KernelShape,
    pub dims: usize,
}

impl KernelKey {
    pub fn new(name: impl Into<String>, shape: KernelShape, dims: usize) -> Self {
        Self {
            name: name.into(),
            shape,
            dims,
        }
    }
}

impl fmt::Display for KernelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}<{}d {}>", self.name, self.dims, self.shape)
    }
}

/// What the registry knows about one kernel.
#[derive(Debug)]
pub struct KernelDescriptor {
    pub key: KernelKey,
    pub id: u64,
    /// Accessors requested by the first command group that launched the kernel.
    pub accesses: Vec<AccessDescriptor>,
    launches: AtomicU64,
}

impl KernelDescriptor {
    pub fn launches(&self) -> u64 {
        self.launches.load(Ordering::Relaxed)
    }

    pub(crate) fn record_launch(&self) {
        self.launches.fetch_add(1, Ordering::Relaxed);
    }
}

/// Thread-safe kernel table.
///
/// Lookups take the read lock only; the first registration of a key takes the write lock and
/// re-checks, so racing registrations agree on one descriptor.
#[derive(Default)]
pub struct KernelRegistry {
    kernels: RwLock<HashMap<KernelKey, Arc<KernelDescriptor>>>,
}

impl KernelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_register(&self, key: &KernelKey, accesses: impl FnOnce() -> Vec<AccessDescriptor>) -> Arc<KernelDescriptor> {
        if let Some(descriptor) = self.kernels.read().get(key) {
            return Arc::clone(descriptor);
        }

        let mut kernels = self.kernels.write();
        let id = kernels.len() as u64;
        let descriptor = kernels.entry(key.clone()).or_insert_with(|| {
            tracing::debug!(kernel = %key, id, "kernel registered");
            Arc::new(KernelDescriptor {
                key: key.clone(),
                id,
                accesses: accesses(),
                launches: AtomicU64::new(0),
            })
        });
        Arc::clone(descriptor)
    }

    pub fn get(&self, key: &KernelKey) -> Option<Arc<KernelDescriptor>> {
        self.kernels.read().get(key).cloned()
    }

    /// Every registered kernel called `name`, whatever its shape.
    pub fn find_by_name(&self, name: &str) -> Vec<Arc<KernelDescriptor>> {
        self.kernels
            .read()
            .values()
            .filter(|descriptor| descriptor.key.name == name)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.kernels.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for KernelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KernelRegistry").field("kernels", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{AccessMode, AccessTarget, ElementKind};

    fn descriptor(mode: AccessMode) -> AccessDescriptor {
        AccessDescriptor {
            element: ElementKind::F32,
            dims: 1,
            mode,
            target: AccessTarget::GlobalBuffer,
        }
    }

    #[test]
    fn registration_happens_once_per_key() {
        let registry = KernelRegistry::new();
        let key = KernelKey::new("scale", KernelShape::Basic, 1);

        let first = registry.get_or_register(&key, || vec![descriptor(AccessMode::ReadWrite)]);
        let second = registry.get_or_register(&key, || panic!("already registered"));
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.accesses.len(), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn shape_and_dims_are_part_of_the_key() {
        let registry = KernelRegistry::new();
        let a = registry.get_or_register(&KernelKey::new("k", KernelShape::Basic, 1), Vec::new);
        let b = registry.get_or_register(&KernelKey::new("k", KernelShape::NdRange, 1), Vec::new);
        let c = registry.get_or_register(&KernelKey::new("k", KernelShape::Basic, 2), Vec::new);
        assert_ne!(a.id, b.id);
        assert_ne!(b.id, c.id);
        assert_eq!(registry.find_by_name("k").len(), 3);
    }

    #[test]
    fn launches_are_counted() {
        let registry = KernelRegistry::new();
        let key = KernelKey::new("count", KernelShape::SingleTask, 1);
        let kernel = registry.get_or_register(&key, Vec::new);
        kernel.record_launch();
        kernel.record_launch();
        assert_eq!(registry.get(&key).map(|k| k.launches()), Some(2));
    }
}
