//! Per-buffer record of in-flight accesses, from which implicit dependencies are derived.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use super::Event;
use crate::memory::{AccessMode, AccessRange};

static NEXT_BUFFER_ID: AtomicU64 = AtomicU64::new(1);

struct AccessRecord {
    range: AccessRange,
    mode: AccessMode,
    event: Event,
}

pub(crate) struct AccessTracker {
    buffer: u64,
    records: Mutex<Vec<AccessRecord>>,
}

impl AccessTracker {
    pub(crate) fn new() -> Self {
        Self {
            buffer: NEXT_BUFFER_ID.fetch_add(1, Ordering::Relaxed),
            records: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn buffer_id(&self) -> u64 {
        self.buffer
    }

    /// Record that `event` will access `range` with `mode` and return the earlier unfinished
    /// events it must wait for. Reads only wait for writers; anything that may write waits for
    /// every overlapping access, including discard modes, which still need write-after-write
    /// and write-after-read ordering.
    pub(crate) fn register(&self, range: AccessRange, mode: AccessMode, event: &Event) -> Vec<Event> {
        let mut records = self.records.lock();
        records.retain(|record| !record.event.is_finished());

        let dependencies = records
            .iter()
            .filter(|record| !record.event.same_as(event))
            .filter(|record| record.mode.conflicts_with(mode) && record.range.overlaps(&range))
            .map(|record| record.event.clone())
            .collect();

        records.push(AccessRecord {
            range,
            mode,
            event: event.clone(),
        });
        dependencies
    }

    /// Every unfinished access, used when the buffer goes away.
    pub(crate) fn outstanding(&self) -> Vec<Event> {
        let mut records = self.records.lock();
        records.retain(|record| !record.event.is_finished());
        records.iter().map(|record| record.event.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IndexArray;
    use std::sync::Weak;

    fn span(offset: usize, len: usize) -> AccessRange {
        AccessRange::new(IndexArray::new(offset, 0, 0), IndexArray::new(len, 1, 1))
    }

    fn pending() -> Event {
        Event::pending(Weak::new(), false)
    }

    #[test]
    fn readers_do_not_depend_on_readers() {
        let tracker = AccessTracker::new();
        let (first, second) = (pending(), pending());
        assert!(tracker.register(span(0, 8), AccessMode::Read, &first).is_empty());
        assert!(tracker.register(span(0, 8), AccessMode::Read, &second).is_empty());
    }

    #[test]
    fn writers_wait_for_overlapping_access() {
        let tracker = AccessTracker::new();
        let (reader, writer, disjoint) = (pending(), pending(), pending());
        tracker.register(span(0, 8), AccessMode::Read, &reader);
        let deps = tracker.register(span(4, 8), AccessMode::DiscardWrite, &writer);
        assert_eq!(deps.len(), 1);
        assert!(deps[0].same_as(&reader));
        assert!(tracker.register(span(12, 4), AccessMode::ReadWrite, &disjoint).is_empty());
    }

    #[test]
    fn finished_accesses_are_dropped() {
        let tracker = AccessTracker::new();
        let writer = pending();
        tracker.register(span(0, 4), AccessMode::Write, &writer);
        writer.finish(Ok(()));
        assert!(tracker.register(span(0, 4), AccessMode::Read, &pending()).is_empty());
        assert_eq!(tracker.outstanding().len(), 1);
    }

    #[test]
    fn accesses_of_one_submission_do_not_depend_on_each_other() {
        let tracker = AccessTracker::new();
        let event = pending();
        tracker.register(span(0, 4), AccessMode::Read, &event);
        assert!(tracker.register(span(0, 4), AccessMode::Write, &event).is_empty());
    }
}
