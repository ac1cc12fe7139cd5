//! Command-group handler: collects one submission's accesses, dependencies and kernel.

use std::any::type_name;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::registry::{KernelKey, KernelShape};
use super::tracker::AccessTracker;
use super::Event;
use crate::backend::{Executor, GroupContext, LaneContext, LaunchShape, LocalMemory};
use crate::device::Device;
use crate::error::{Error, Result};
use crate::index::{Id, IndexArray, NdRange, Range};
use crate::item::{Group, Item, NdItem};
use crate::memory::{AccessDescriptor, AccessMode, AccessRange, Accessor, Element, LocalAccessor, LocalDecl};

static NEXT_COMMAND_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) type Launch = Box<dyn FnOnce(&dyn Executor, LocalMemory<'_>) -> Result<()> + Send>;

pub(crate) struct KernelCommand {
    pub(crate) key: KernelKey,
    pub(crate) work_items: usize,
    pub(crate) launch: Launch,
}

pub(crate) struct AccessRequest {
    pub(crate) tracker: Arc<AccessTracker>,
    pub(crate) range: AccessRange,
    pub(crate) mode: AccessMode,
    pub(crate) descriptor: AccessDescriptor,
}

/// Everything a finished command-group function handed to the queue.
pub(crate) struct CommandGroup {
    pub(crate) command: u64,
    pub(crate) requests: Vec<AccessRequest>,
    pub(crate) locals: Vec<LocalDecl>,
    pub(crate) dependencies: Vec<Event>,
    pub(crate) kernel: Option<KernelCommand>,
}

/// Passed to the command-group function of [`super::Queue::submit`].
///
/// Accessors requested through it declare what the submission reads and writes; at most one
/// kernel may be launched from it.
pub struct Handler {
    command: u64,
    device: Device,
    name: Option<String>,
    requests: Vec<AccessRequest>,
    locals: Vec<LocalDecl>,
    dependencies: Vec<Event>,
    kernel: Option<KernelCommand>,
}

impl Handler {
    pub(crate) fn new(device: Device) -> Self {
        Self {
            command: NEXT_COMMAND_ID.fetch_add(1, Ordering::Relaxed),
            device,
            name: None,
            requests: Vec::new(),
            locals: Vec::new(),
            dependencies: Vec::new(),
            kernel: None,
        }
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn command_id(&self) -> u64 {
        self.command
    }

    /// Register the kernel under `name` instead of its closure type name.
    pub fn named(&mut self, name: impl Into<String>) -> &mut Self {
        self.name = Some(name.into());
        self
    }

    /// Do not start before `event` has completed.
    pub fn depends_on(&mut self, event: &Event) -> &mut Self {
        self.dependencies.push(event.clone());
        self
    }

    pub fn depends_on_all(&mut self, events: &[Event]) -> &mut Self {
        self.dependencies.extend_from_slice(events);
        self
    }

    /// Declare `range` elements of work-group local memory.
    pub fn local_accessor<T: Element, const N: usize>(&mut self, range: Range<N>) -> LocalAccessor<T, N> {
        let slot = self.locals.len();
        self.locals.push(LocalDecl::new::<T>(range.size()));
        LocalAccessor::new(self.command, slot, range)
    }

    pub(crate) fn require(
        &mut self,
        tracker: Arc<AccessTracker>,
        range: AccessRange,
        mode: AccessMode,
        descriptor: AccessDescriptor,
    ) {
        self.requests.push(AccessRequest {
            tracker,
            range,
            mode,
            descriptor,
        });
    }

    fn set_kernel<K>(&mut self, shape: KernelShape, dims: usize, work_items: usize, launch: Launch) -> Result<()> {
        if let Some(existing) = &self.kernel {
            return Err(Error::runtime(format!(
                "command group {} already launches {}; one kernel per submission",
                self.command, existing.key
            )));
        }
        let name = self.name.take().unwrap_or_else(|| type_name::<K>().to_string());
        self.kernel = Some(KernelCommand {
            key: KernelKey::new(name, shape, dims),
            work_items,
            launch,
        });
        Ok(())
    }

    fn check_group_size(&self, local: usize) -> Result<()> {
        let max = self.device.max_work_group_size();
        if local > max {
            return Err(Error::nd_range(format!(
                "work-group of {local} work-items exceeds the maximum of {max} on {}",
                self.device.name()
            )));
        }
        Ok(())
    }

    /// Run `kernel` once.
    pub fn single_task<F>(&mut self, kernel: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.set_kernel::<F>(
            KernelShape::SingleTask,
            1,
            1,
            Box::new(move |_executor: &dyn Executor, _locals: LocalMemory<'_>| {
                kernel();
                Ok(())
            }),
        )
    }

    /// Run `kernel` once per point of `range`.
    pub fn parallel_for<const N: usize, F>(&mut self, range: Range<N>, kernel: F) -> Result<()>
    where
        F: Fn(Item<N>) + Send + Sync + 'static,
    {
        self.parallel_for_offset(range, Id::zero(), kernel)
    }

    /// Like [`Handler::parallel_for`] with every id shifted by `offset`.
    pub fn parallel_for_offset<const N: usize, F>(&mut self, range: Range<N>, offset: Id<N>, kernel: F) -> Result<()>
    where
        F: Fn(Item<N>) + Send + Sync + 'static,
    {
        let shape = LaunchShape::basic(N, range.as_index_array(), offset.as_index_array());
        self.set_kernel::<F>(
            KernelShape::Basic,
            N,
            shape.work_items(),
            Box::new(move |executor: &dyn Executor, _locals: LocalMemory<'_>| {
                executor.run_items(&shape, &|raw| kernel(Item::new(Id::from_index_array(raw) + offset, range, offset)))
            }),
        )
    }

    /// Run `kernel` once per work-item of `nd_range`. Work-items of a group may synchronise with
    /// [`NdItem::barrier`] and share local memory.
    pub fn parallel_for_nd<const N: usize, F>(&mut self, nd_range: NdRange<N>, kernel: F) -> Result<()>
    where
        F: Fn(NdItem<'_, N>) + Send + Sync + 'static,
    {
        nd_range.validate()?;
        self.check_group_size(nd_range.local_range().size())?;
        let shape = LaunchShape::nd(
            N,
            nd_range.global_range().as_index_array(),
            nd_range.local_range().as_index_array(),
            nd_range.offset().as_index_array(),
        );
        self.set_kernel::<F>(
            KernelShape::NdRange,
            N,
            shape.work_items(),
            Box::new(move |executor: &dyn Executor, locals: LocalMemory<'_>| {
                executor.run_lanes(&shape, locals, &|lane: &LaneContext<'_>| kernel(NdItem::from_lane(lane, nd_range)))
            }),
        )
    }

    /// Run `kernel` once per work-group of `groups`, each of `local` work-items. Inside, the
    /// work-items are visited with [`Group::parallel_for_work_item`].
    pub fn parallel_for_work_group<const N: usize, F>(&mut self, groups: Range<N>, local: Range<N>, kernel: F) -> Result<()>
    where
        F: Fn(Group<'_, N>) + Send + Sync + 'static,
    {
        if let Some(k) = (0..N).find(|&k| local.get(k) == 0) {
            return Err(Error::nd_range(format!("local range {local} has a zero extent in dimension {k}")));
        }
        self.check_group_size(local.size())?;
        let shape = LaunchShape::hierarchical(N, groups.as_index_array(), local.as_index_array());
        self.set_kernel::<F>(
            KernelShape::Hierarchical,
            N,
            shape.work_items(),
            Box::new(move |executor: &dyn Executor, locals: LocalMemory<'_>| {
                executor.run_groups(&shape, locals, &|context: &GroupContext<'_>| kernel(Group::for_work_group(context)))
            }),
        )
    }

    /// Set every element visible through `dest` to `value`.
    pub fn fill<T: Element, const N: usize>(&mut self, dest: &Accessor<T, N>, value: T) -> Result<()> {
        self.check_owned("fill", dest.command_id())?;
        if !dest.mode().can_write() {
            return Err(Error::accessor(format!("fill needs a writable accessor, got {:?}", dest.mode())));
        }
        let dest = dest.clone();
        let range = dest.range();
        let shape = LaunchShape::basic(N, range.as_index_array(), IndexArray::splat(0));
        self.set_kernel::<Accessor<T, N>>(
            KernelShape::Fill,
            N,
            shape.work_items(),
            Box::new(move |executor: &dyn Executor, _locals: LocalMemory<'_>| {
                executor.run_items(&shape, &|raw| dest.write(Id::<N>::from_index_array(raw), value))
            }),
        )
    }

    /// Copy the elements of `src` into `dest` in row-major order.
    pub fn copy<T: Element, const N: usize, const M: usize>(
        &mut self,
        src: &Accessor<T, N>,
        dest: &Accessor<T, M>,
    ) -> Result<()> {
        self.check_owned("copy", src.command_id())?;
        self.check_owned("copy", dest.command_id())?;
        if !src.mode().can_read() || !dest.mode().can_write() {
            return Err(Error::accessor(format!(
                "copy needs a readable source and a writable destination, got {:?} and {:?}",
                src.mode(),
                dest.mode()
            )));
        }
        if src.len() != dest.len() {
            return Err(Error::invalid_parameter(format!(
                "copy source holds {} elements but the destination {}",
                src.len(),
                dest.len()
            )));
        }
        let (src, dest) = (src.clone(), dest.clone());
        let shape = LaunchShape::basic(1, IndexArray::new(src.len(), 1, 1), IndexArray::splat(0));
        self.set_kernel::<(Accessor<T, N>, Accessor<T, M>)>(
            KernelShape::Copy,
            1,
            shape.work_items(),
            Box::new(move |executor: &dyn Executor, _locals: LocalMemory<'_>| {
                let (src_range, dest_range) = (src.range(), dest.range());
                executor.run_items(&shape, &|raw| {
                    let linear = raw[0];
                    dest.write(dest_range.delinearize(linear), src.read(src_range.delinearize(linear)));
                })
            }),
        )
    }

    /// Accessors from another submission carry no dependency edge for this one.
    fn check_owned(&self, operation: &str, command: u64) -> Result<()> {
        if command == self.command {
            return Ok(());
        }
        Err(Error::accessor(format!(
            "{operation} was given an accessor of command group {command}, not of this one ({})",
            self.command
        )))
    }

    pub(crate) fn into_command_group(self) -> CommandGroup {
        CommandGroup {
            command: self.command,
            requests: self.requests,
            locals: self.locals,
            dependencies: self.dependencies,
            kernel: self.kernel,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use crate::device::Platform;
    use crate::error::ErrorKind;

    fn handler() -> Handler {
        let platform = Platform::host(&RuntimeConfig::default());
        Handler::new(platform.devices()[0].clone())
    }

    #[test]
    fn second_kernel_is_rejected() {
        let mut h = handler();
        h.single_task(|| {}).expect("first kernel");
        let err = h.single_task(|| {}).expect_err("second kernel");
        assert_eq!(err.kind(), ErrorKind::Runtime);
    }

    #[test]
    fn indivisible_nd_range_fails_at_submission() {
        let mut h = handler();
        let err = h
            .parallel_for_nd(NdRange::new(Range::new([10]), Range::new([4])), |_item| {})
            .expect_err("10 % 4 != 0");
        assert_eq!(err.kind(), ErrorKind::NdRange);
        assert!(h.kernel.is_none());
    }

    #[test]
    fn oversized_work_groups_are_rejected() {
        let mut h = handler();
        let err = h
            .parallel_for_nd(NdRange::new(Range::new([1024]), Range::new([512])), |_item| {})
            .expect_err("512 > 256");
        assert_eq!(err.kind(), ErrorKind::NdRange);
        let err = h
            .parallel_for_work_group(Range::new([2]), Range::new([0]), |_group| {})
            .expect_err("zero local extent");
        assert_eq!(err.kind(), ErrorKind::NdRange);
    }

    #[test]
    fn names_default_to_the_closure_type() {
        let mut h = handler();
        h.named("explicit").parallel_for(Range::new([4]), |_item| {}).expect("kernel");
        let key = h.kernel.as_ref().map(|k| k.key.clone()).expect("kernel recorded");
        assert_eq!(key, KernelKey::new("explicit", KernelShape::Basic, 1));

        let mut h = handler();
        h.parallel_for(Range::new([2, 2]), |_item| {}).expect("kernel");
        let key = h.kernel.as_ref().map(|k| k.key.clone()).expect("kernel recorded");
        assert!(key.name.contains("closure"), "{}", key.name);
        assert_eq!(key.dims, 2);
    }

    #[test]
    fn local_accessors_take_consecutive_slots() {
        let mut h = handler();
        let a = h.local_accessor::<f32, 1>(Range::new([16]));
        let b = h.local_accessor::<u8, 2>(Range::new([4, 4]));
        assert_eq!(a.range().size(), 16);
        assert_eq!(b.range().size(), 16);
        let group = h.into_command_group();
        assert_eq!(group.locals.len(), 2);
        assert_eq!(group.locals[0].byte_len(), 64);
        assert_eq!(group.locals[1].byte_len(), 16);
    }
}
