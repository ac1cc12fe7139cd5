//! Buffers, host accessors, shared allocations and the ordering the dependency engine derives
//! from them.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use syclrt::{AccessMode, AccessTarget, Buffer, ErrorKind, Event, EventStatus, Id, Range, Result};

#[test]
fn host_data_is_written_back_on_drop() -> Result<()> {
    for queue in common::queues()? {
        let mut data = vec![3i32; 64];
        {
            let buffer = Buffer::with_host_data(&mut data, Range::new([8, 8]))?;
            queue.submit(|h| {
                let acc = buffer.access(h, AccessMode::ReadWrite)?;
                h.parallel_for(Range::new([8, 8]), move |item| acc.update(item, |v| v + item.get(0) as i32))
            })?;
        }
        for (i, &v) in data.iter().enumerate() {
            assert_eq!(v, 3 + (i / 8) as i32);
        }
    }
    Ok(())
}

#[test]
fn cleared_final_data_discards_device_writes() -> Result<()> {
    for queue in common::queues()? {
        let mut data = vec![1u8; 16];
        {
            let mut buffer = Buffer::from_host(&mut data);
            buffer.set_final_data(None)?;
            queue.submit(|h| {
                let acc = buffer.access(h, AccessMode::Write)?;
                h.fill(&acc, 9)
            })?;
        }
        assert!(data.iter().all(|&v| v == 1));
    }
    Ok(())
}

#[test]
fn writer_waits_for_earlier_readers_and_later_readers_wait_for_it() -> Result<()> {
    for queue in common::queues()? {
        let buffer = Buffer::copy_from(&[1u64; 32]);
        let sink = Buffer::<u64>::new(Range::new([32]));
        let log = Arc::new(Mutex::new(Vec::new()));

        let slow_log = Arc::clone(&log);
        let first = queue.submit(|h| {
            let src = buffer.access(h, AccessMode::Read)?;
            let dst = sink.access(h, AccessMode::Write)?;
            h.single_task(move || {
                thread::sleep(Duration::from_millis(20));
                dst.write(0, src.read(0));
                slow_log.lock().push("read");
            })
        })?;

        let write_log = Arc::clone(&log);
        let second = queue.submit(|h| {
            let acc = buffer.access(h, AccessMode::ReadWrite)?;
            h.single_task(move || {
                acc.write(0, 42);
                write_log.lock().push("write");
            })
        })?;

        let after = Buffer::<u64>::new(Range::new([1]));
        let third = queue.submit(|h| {
            let src = buffer.access(h, AccessMode::Read)?;
            let dst = after.access(h, AccessMode::Write)?;
            h.single_task(move || dst.write(0, src.read(0)))
        })?;

        Event::wait_all(&[first, second, third]);
        assert_eq!(*log.lock(), vec!["read", "write"]);
        assert_eq!(sink.host_access(AccessMode::Read).read(0), 1);
        assert_eq!(after.host_access(AccessMode::Read).read(0), 42);
    }
    Ok(())
}

#[test]
fn disjoint_regions_do_not_order_each_other() -> Result<()> {
    for queue in common::queues()? {
        let buffer = Buffer::<i32>::new(Range::new([16]));
        let gate = Arc::new(AtomicUsize::new(0));

        let waiting = Arc::clone(&gate);
        let blocked = queue.submit(|h| {
            let low = buffer.access_range(h, AccessMode::Write, Range::new([8]), Id::new([0]))?;
            h.single_task(move || {
                while waiting.load(Ordering::Acquire) == 0 {
                    thread::yield_now();
                }
                low.write(0, 1);
            })
        })?;

        if queue.device().is_cpu() {
            let opening = Arc::clone(&gate);
            let high = queue.submit(|h| {
                let high = buffer.access_range(h, AccessMode::Write, Range::new([8]), Id::new([8]))?;
                h.single_task(move || {
                    high.write(0, 2);
                    opening.store(1, Ordering::Release);
                })
            })?;
            // Would deadlock if the second writer waited for the first.
            high.wait();
        } else {
            gate.store(1, Ordering::Release);
        }
        blocked.wait();
        assert_eq!(blocked.status(), EventStatus::Complete);
    }
    Ok(())
}

#[test]
fn fill_and_copy_between_accessors() -> Result<()> {
    for queue in common::queues()? {
        let src = Buffer::<f64, 2>::new(Range::new([4, 4]));
        let dst = Buffer::<f64>::new(Range::new([16]));
        queue.submit(|h| {
            let acc = src.access(h, AccessMode::DiscardWrite)?;
            h.fill(&acc, 2.5)
        })?;
        queue.submit(|h| {
            let from = src.access(h, AccessMode::Read)?;
            let to = dst.access(h, AccessMode::DiscardWrite)?;
            h.copy(&from, &to)
        })?;
        assert!(dst.host_access(AccessMode::Read).as_slice().iter().all(|&v| v == 2.5));
    }
    Ok(())
}

#[test]
fn accessor_errors_surface_at_submission() -> Result<()> {
    let queue = common::queues()?.remove(0);
    let buffer = Buffer::<i32>::new(Range::new([8]));

    let out_of_bounds = queue
        .submit(|h| buffer.access_range(h, AccessMode::Read, Range::new([4]), Id::new([6])).map(drop))
        .unwrap_err();
    assert_eq!(out_of_bounds.kind(), ErrorKind::Accessor);

    let image = queue
        .submit(|h| {
            buffer
                .access_target(h, AccessMode::Read, AccessTarget::Image, Range::new([8]), Id::new([0]))
                .map(drop)
        })
        .unwrap_err();
    assert_eq!(image.kind(), ErrorKind::FeatureNotSupported);

    let constant_write = queue
        .submit(|h| {
            buffer
                .access_target(h, AccessMode::Write, AccessTarget::ConstantBuffer, Range::new([8]), Id::new([0]))
                .map(drop)
        })
        .unwrap_err();
    assert_eq!(constant_write.kind(), ErrorKind::Accessor);

    let fill_read_only = queue
        .submit(|h| {
            let acc = buffer.access(h, AccessMode::Read)?;
            h.fill(&acc, 1)
        })
        .unwrap_err();
    assert_eq!(fill_read_only.kind(), ErrorKind::Accessor);
    Ok(())
}

#[test]
fn accessors_do_not_outlive_their_command_group() -> Result<()> {
    for queue in common::queues()? {
        let buffer = Buffer::copy_from(&[1u32; 8]);
        let mut kept = None;
        queue
            .submit(|h| {
                let acc = buffer.access(h, AccessMode::Write)?;
                kept = Some(acc.clone());
                h.fill(&acc, 3)
            })?
            .wait();
        let kept = kept.expect("accessor captured");

        let view = buffer.host_access(AccessMode::ReadWrite);
        let err = queue.submit(|h| h.fill(&kept, 7)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Accessor);
        let err = queue
            .submit(|h| {
                let src = buffer.access(h, AccessMode::Read)?;
                h.copy(&src, &kept)
            })
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Accessor);
        assert_eq!(view.read(0), 3);
        view.write(0, 4);
        assert!(view.as_slice().iter().skip(1).all(|&v| v == 3));
    }
    Ok(())
}

#[test]
fn host_accessor_waits_for_kernels_and_blocks_later_ones() -> Result<()> {
    for queue in common::queues()? {
        let buffer = Buffer::<u32>::new(Range::new([4]));
        queue.submit(|h| {
            let acc = buffer.access(h, AccessMode::Write)?;
            h.single_task(move || {
                thread::sleep(Duration::from_millis(10));
                acc.write(0, 7);
            })
        })?;

        let pending = {
            let mut view = buffer.host_access(AccessMode::ReadWrite);
            assert_eq!(view.read(0), 7);
            let later = queue.submit(|h| {
                let acc = buffer.access(h, AccessMode::ReadWrite)?;
                h.single_task(move || acc.update(0, |v| v * 10))
            })?;
            thread::sleep(Duration::from_millis(10));
            assert!(!later.is_finished(), "kernel ran while the host held the buffer");
            view.as_mut_slice()[0] = 8;
            later
        };
        pending.wait();
        assert_eq!(buffer.host_access(AccessMode::Read).read(0), 80);
    }
    Ok(())
}

#[test]
fn shared_allocations_follow_explicit_events() -> Result<()> {
    for queue in common::queues()? {
        let data = queue.malloc_shared::<i32>(256)?;
        data.fill(5);

        let writer = data.clone();
        let doubled = queue.parallel_for(Range::new([256]), move |item| {
            writer.update(item.linear_id(), |v| v * 2);
        })?;
        let reader = data.clone();
        let incremented = queue.parallel_for_after(Range::new([256]), &[doubled], move |item| {
            reader.update(item.linear_id(), |v| v + 1);
        })?;
        incremented.wait();

        assert!(data.to_vec().iter().all(|&v| v == 11));
    }
    Ok(())
}

#[test]
fn atomics_count_across_work_groups() -> Result<()> {
    for queue in common::queues()? {
        let counter = Buffer::<u64>::new(Range::new([1]));
        let extremes = Buffer::copy_from(&[f32::MAX, f32::MIN]);
        queue.submit(|h| {
            let count = counter.access(h, AccessMode::Atomic)?;
            let bounds = extremes.access(h, AccessMode::Atomic)?;
            h.parallel_for(Range::new([1000]), move |item| {
                count.atomic(0).fetch_add(1);
                let v = item.linear_id() as f32 - 500.0;
                bounds.atomic(0).fetch_min(v);
                bounds.atomic(1).fetch_max(v);
            })
        })?;
        assert_eq!(counter.host_access(AccessMode::Read).read(0), 1000);
        assert_eq!(extremes.host_access(AccessMode::Read).to_vec(), vec![-500.0, 499.0]);
    }
    Ok(())
}
