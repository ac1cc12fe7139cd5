//! Tree reduction over work-groups.
//!
//! Each pass loads one element per work-item into local scratch, halves the number of active
//! work-items after every barrier and lets work-item 0 publish the group's partial result. The
//! partials form the input of the next pass until a single value is left, which is finally
//! combined with the caller's initial value on the host.
//!
//! Only power-of-two lengths are accepted; the halving scheme silently drops elements otherwise.

use std::sync::Arc;
use std::time::Instant;

use syclrt_tracing::perf_span;
use syclrt_tracing::performance::record_throughput;
use tracing::debug;

use crate::error::{Error, Result};
use crate::index::{NdRange, Range};
use crate::item::FenceSpace;
use crate::memory::{AccessMode, Buffer, Element};
use crate::queue::Queue;

pub fn is_power_of_two(value: usize) -> bool {
    value.is_power_of_two()
}

/// Largest power of two not above `limit` (at least 1).
fn power_of_two_floor(limit: usize) -> usize {
    match limit {
        0 | 1 => 1,
        n => 1 << (usize::BITS - 1 - n.leading_zeros()),
    }
}

/// Reduce `values` with `bop`, starting from `init`, on `queue`'s device.
///
/// `bop` must be associative and commutative: the combination order follows the tree, not the
/// input order. An empty input yields `init`; a single element yields `bop(init, values[0])`
/// without launching anything.
///
/// # Errors
///
/// `InvalidParameter` when the length is not a power of two. Kernel failures are returned as
/// they were recorded on the failing pass.
pub fn tree_reduce<T, F>(queue: &Queue, values: &[T], init: T, bop: F) -> Result<T>
where
    T: Element,
    F: Fn(T, T) -> T + Send + Sync + 'static,
{
    match values.len() {
        0 => return Ok(init),
        1 => return Ok(bop(init, values[0])),
        len if !is_power_of_two(len) => {
            return Err(Error::invalid_parameter(format!(
                "tree reduction needs a power-of-two length, got {len}"
            )));
        }
        _ => {}
    }

    let _span = perf_span!("tree_reduce", elements = values.len());
    let start = Instant::now();
    let bop = Arc::new(bop);
    let max_group = power_of_two_floor(queue.device().max_work_group_size());

    let mut input = Buffer::copy_from(values);
    input.set_final_data(None)?;
    let mut len = values.len();
    let mut passes = 0;

    while len > 1 {
        let group_size = len.min(max_group);
        let groups = len / group_size;
        let output = Buffer::<T>::new(Range::new([groups]));

        let event = queue.submit(|h| {
            let data = input.access(h, AccessMode::Read)?;
            let partials = output.access(h, AccessMode::DiscardWrite)?;
            let scratch = h.local_accessor::<T, 1>(Range::new([group_size]));
            let bop = Arc::clone(&bop);
            h.named("tree_reduce").parallel_for_nd(
                NdRange::new(Range::new([len]), Range::new([group_size])),
                move |item| {
                    let local = scratch.bind(&item);
                    let lid = item.local(0);
                    local.write(lid, data.read(item.global_id()));
                    item.barrier(FenceSpace::Local);

                    let mut offset = group_size / 2;
                    while offset > 0 {
                        if lid < offset {
                            local.write(lid, bop(local.read(lid), local.read(lid + offset)));
                        }
                        item.barrier(FenceSpace::Local);
                        offset /= 2;
                    }

                    if lid == 0 {
                        partials.write(item.group_linear_id(), local.read(0));
                    }
                },
            )
        })?;
        event.wait();
        if let Some(err) = event.error() {
            return Err(err);
        }

        debug!(pass = passes, len, group_size, groups, "tree reduction pass complete");
        input = output;
        len = groups;
        passes += 1;
    }

    let reduced = input.host_access(AccessMode::Read).read(0);
    record_throughput("tree_reduce", values.len(), start.elapsed().as_micros() as u64);
    Ok(bop(init, reduced))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use crate::device::Platform;
    use crate::error::ErrorKind;

    fn queues(config: &RuntimeConfig) -> Vec<Queue> {
        Platform::host(config)
            .devices()
            .iter()
            .map(|device| Queue::builder(device.clone()).build().expect("queue"))
            .collect()
    }

    #[test]
    fn power_of_two_floor_rounds_down() {
        assert_eq!(power_of_two_floor(0), 1);
        assert_eq!(power_of_two_floor(1), 1);
        assert_eq!(power_of_two_floor(100), 64);
        assert_eq!(power_of_two_floor(256), 256);
    }

    #[test]
    fn sums_match_a_sequential_fold() {
        for queue in queues(&RuntimeConfig::default()) {
            let values: Vec<i64> = (0..256).map(|v| v * 3 - 100).collect();
            let expected = values.iter().sum::<i64>() + 7;
            assert_eq!(tree_reduce(&queue, &values, 7, |a, b| a + b).expect("reduce"), expected);
        }
    }

    #[test]
    fn several_passes_when_groups_are_small() {
        let config = RuntimeConfig {
            max_work_group_size: 6,
            ..RuntimeConfig::default()
        };
        for queue in queues(&config) {
            let values: Vec<u32> = (1..=64).collect();
            let max = tree_reduce(&queue, &values, 0, |a: u32, b: u32| a.max(b)).expect("reduce");
            assert_eq!(max, 64);
            let sum = tree_reduce(&queue, &values, 0, |a: u32, b: u32| a + b).expect("reduce");
            assert_eq!(sum, 64 * 65 / 2);
        }
    }

    #[test]
    fn trivial_lengths_skip_the_device() {
        let queue = queues(&RuntimeConfig::default()).remove(0);
        assert_eq!(tree_reduce(&queue, &[] as &[i32], 5, |a, b| a + b).expect("empty"), 5);
        assert_eq!(tree_reduce(&queue, &[9], 5, |a, b| a * b).expect("single"), 45);
    }

    #[test]
    fn other_lengths_are_rejected() {
        let queue = queues(&RuntimeConfig::default()).remove(0);
        let err = tree_reduce(&queue, &[1, 2, 3], 0, |a: i32, b: i32| a + b).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
    }
}
