//! Buffers: host-visible regions whose kernel accesses are ordered by the dependency engine.

use std::sync::Arc;

use syclrt_tracing::{perf_event, timed_block};
use syclrt_tracing::performance::record_transfer;
use tracing::debug;

use super::host::HostAccessor;
use super::storage::Storage;
use super::{AccessMode, AccessRange, AccessTarget, Accessor, Element};
use crate::error::{Error, Result};
use crate::index::{Id, Range};
use crate::queue::{AccessTracker, Event, Handler};

/// A typed, `N`-dimensional region of memory.
///
/// The buffer owns its storage. When it was constructed over a mutable host slice, or given one
/// with [`Buffer::set_final_data`], the contents are written back to that slice on drop. Dropping
/// a buffer blocks until every submitted command that uses it has finished.
pub struct Buffer<'h, T: Element, const N: usize = 1> {
    storage: Arc<Storage<T>>,
    tracker: Arc<AccessTracker>,
    range: Range<N>,
    final_data: Option<&'h mut [T]>,
}

impl<'h, T: Element, const N: usize> Buffer<'h, T, N> {
    fn with_storage(storage: Storage<T>, range: Range<N>, final_data: Option<&'h mut [T]>) -> Self {
        let tracker = Arc::new(AccessTracker::new());
        debug!(
            buffer = tracker.buffer_id(),
            element = %T::KIND,
            range = %range,
            write_back = final_data.is_some(),
            "buffer created"
        );
        Self {
            storage: Arc::new(storage),
            tracker,
            range,
            final_data,
        }
    }

    fn check_len(len: usize, range: Range<N>) -> Result<()> {
        if len != range.size() {
            return Err(Error::invalid_parameter(format!(
                "host data holds {len} elements but the buffer range {range} needs {}",
                range.size()
            )));
        }
        Ok(())
    }

    /// A zero-initialised buffer with no host counterpart.
    pub fn new(range: Range<N>) -> Self {
        Self::with_storage(Storage::zeroed(range.size()), range, None)
    }

    /// A buffer initialised from `data`. Nothing is written back.
    pub fn from_slice(data: &[T], range: Range<N>) -> Result<Self> {
        Self::check_len(data.len(), range)?;
        Ok(Self::with_storage(Storage::from_vec(data.to_vec()), range, None))
    }

    /// A buffer initialised from `host` that writes its final contents back to `host` on drop.
    pub fn with_host_data(host: &'h mut [T], range: Range<N>) -> Result<Self> {
        Self::check_len(host.len(), range)?;
        let storage = Storage::from_vec(host.to_vec());
        Ok(Self::with_storage(storage, range, Some(host)))
    }

    /// A buffer initialised from raw little-endian element bytes.
    pub fn from_bytes(bytes: &[u8], range: Range<N>) -> Result<Self> {
        let expected = range.size() * std::mem::size_of::<T>();
        if bytes.len() != expected {
            return Err(Error::invalid_parameter(format!(
                "{} bytes supplied but the buffer range {range} needs {expected}",
                bytes.len()
            )));
        }
        let values: Vec<T> = bytes
            .chunks_exact(std::mem::size_of::<T>())
            .map(bytemuck::pod_read_unaligned)
            .collect();
        Ok(Self::with_storage(Storage::from_vec(values), range, None))
    }

    /// Replace the write-back target. `None` discards the final contents.
    pub fn set_final_data(&mut self, target: Option<&'h mut [T]>) -> Result<()> {
        if let Some(host) = &target {
            Self::check_len(host.len(), self.range)?;
        }
        self.final_data = target;
        Ok(())
    }

    pub fn range(&self) -> Range<N> {
        self.range
    }

    pub fn len(&self) -> usize {
        self.range.size()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn byte_size(&self) -> usize {
        self.storage.byte_len()
    }

    pub fn id(&self) -> u64 {
        self.tracker.buffer_id()
    }

    /// Whole-buffer global accessor for the command group being built in `handler`.
    pub fn access(&self, handler: &mut Handler, mode: AccessMode) -> Result<Accessor<T, N>> {
        self.access_target(handler, mode, AccessTarget::GlobalBuffer, self.range, Id::zero())
    }

    /// Global accessor restricted to `range` elements starting at `offset`.
    pub fn access_range(
        &self,
        handler: &mut Handler,
        mode: AccessMode,
        range: Range<N>,
        offset: Id<N>,
    ) -> Result<Accessor<T, N>> {
        self.access_target(handler, mode, AccessTarget::GlobalBuffer, range, offset)
    }

    pub fn access_target(
        &self,
        handler: &mut Handler,
        mode: AccessMode,
        target: AccessTarget,
        range: Range<N>,
        offset: Id<N>,
    ) -> Result<Accessor<T, N>> {
        match target {
            AccessTarget::GlobalBuffer => {}
            AccessTarget::ConstantBuffer if mode == AccessMode::Read => {}
            AccessTarget::ConstantBuffer => {
                return Err(Error::accessor(format!(
                    "constant buffer accessors are read-only, got {mode:?}"
                )))
            }
            AccessTarget::Local => {
                return Err(Error::accessor(
                    "local memory is declared with Handler::local_accessor, not through a buffer",
                ))
            }
            AccessTarget::HostBuffer => {
                return Err(Error::accessor("host accessors are created with Buffer::host_access"))
            }
            AccessTarget::Image | AccessTarget::ImageArray | AccessTarget::HostImage => {
                return Err(Error::feature_not_supported(format!(
                    "{target:?} accessors are not supported on host devices"
                )))
            }
        }

        let region = AccessRange::new(offset.as_index_array(), range.as_index_array());
        if !region.fits_within(&self.range.as_index_array()) {
            return Err(Error::accessor(format!(
                "accessor {region} exceeds buffer range {}",
                self.range
            )));
        }

        let accessor = Accessor::new(
            handler.command_id(),
            Arc::clone(&self.storage),
            self.range,
            offset,
            range,
            mode,
            target,
        );
        handler.require(Arc::clone(&self.tracker), region, mode, accessor.descriptor());
        Ok(accessor)
    }

    /// Blocks until every conflicting command has finished, then exposes the contents to the host.
    ///
    /// Commands submitted while the accessor is alive wait for it to drop. Requesting a second,
    /// conflicting host accessor on the same thread deadlocks.
    pub fn host_access(&self, mode: AccessMode) -> HostAccessor<'_, T, N> {
        let hold = Event::host_hold();
        let waits = self.tracker.register(AccessRange::full(self.range.as_index_array()), mode, &hold);
        if !waits.is_empty() {
            perf_event!("host_access_wait", buffer = self.id(), waits = waits.len());
        }
        Event::wait_all(&waits);
        HostAccessor::new(&self.storage, self.range, mode, hold)
    }
}

impl<'h, T: Element> Buffer<'h, T, 1> {
    /// One-dimensional buffer over `host`, written back on drop.
    pub fn from_host(host: &'h mut [T]) -> Self {
        let range = Range::new([host.len()]);
        let storage = Storage::from_vec(host.to_vec());
        Self::with_storage(storage, range, Some(host))
    }

    /// One-dimensional buffer holding a copy of `values`.
    pub fn copy_from(values: &[T]) -> Self {
        Self::with_storage(Storage::from_vec(values.to_vec()), Range::new([values.len()]), None)
    }
}

impl<T: Element, const N: usize> Drop for Buffer<'_, T, N> {
    fn drop(&mut self) {
        let pending = self.tracker.outstanding();
        if !pending.is_empty() {
            debug!(buffer = self.id(), pending = pending.len(), "buffer drop waiting on kernels");
            Event::wait_all(&pending);
        }

        if let Some(host) = self.final_data.take() {
            let bytes = self.storage.byte_len();
            let ((), duration_us) = timed_block!("buffer_write_back", { self.storage.copy_to(host) });
            record_transfer(bytes, "D2H", duration_us);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn length_must_match_the_range() {
        let err = Buffer::<f32, 2>::from_slice(&[0.0; 5], Range::new([2, 3])).err().expect("mismatch");
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);

        let ok = Buffer::<f32, 2>::from_slice(&[1.0; 6], Range::new([2, 3])).expect("matching length");
        assert_eq!(ok.len(), 6);
        assert_eq!(ok.byte_size(), 24);
    }

    #[test]
    fn drop_writes_back_to_host_data() {
        let mut host = vec![1u32, 2, 3];
        {
            let buffer = Buffer::from_host(&mut host);
            let mut view = buffer.host_access(AccessMode::ReadWrite);
            view.as_mut_slice()[1] = 20;
        }
        assert_eq!(host, vec![1, 20, 3]);
    }

    #[test]
    fn clearing_final_data_discards_the_write_back() {
        let mut host = vec![7i32; 4];
        {
            let mut buffer = Buffer::from_host(&mut host);
            buffer.host_access(AccessMode::Write).write(0, 0);
            buffer.set_final_data(None).expect("clear");
        }
        assert_eq!(host, vec![7; 4]);
    }

    #[test]
    fn redirected_final_data_receives_the_contents() {
        let mut target = vec![0u8; 3];
        {
            let mut buffer = Buffer::<u8, 1>::copy_from(&[4, 5, 6]);
            buffer.set_final_data(Some(&mut target)).expect("same length");
        }
        assert_eq!(target, vec![4, 5, 6]);
    }

    #[test]
    fn bytes_decode_little_endian_elements() {
        let bytes: Vec<u8> = [1u16, 0x0203].iter().flat_map(|v| v.to_le_bytes()).collect();
        let buffer = Buffer::<u16, 1>::from_bytes(&bytes, Range::new([2])).expect("two elements");
        assert_eq!(buffer.host_access(AccessMode::Read).to_vec(), vec![1, 0x0203]);

        let err = Buffer::<u16, 1>::from_bytes(&bytes[..3], Range::new([2])).err().expect("short");
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
    }
}
