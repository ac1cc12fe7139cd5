//! Completion tokens of submissions.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use super::queue::QueueShared;
use crate::error::{Error, Result};

static NEXT_EVENT_ID: AtomicU64 = AtomicU64::new(1);

/// Lifecycle of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventStatus {
    /// Waiting for dependencies.
    Pending,
    /// Dependencies resolved, handed to the executor.
    Scheduled,
    Running,
    Complete,
    Failed,
}

impl EventStatus {
    pub const fn is_finished(self) -> bool {
        matches!(self, EventStatus::Complete | EventStatus::Failed)
    }
}

/// Timestamps of a submission, available when the queue was built with profiling enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfilingInfo {
    pub submitted: Instant,
    pub started: Instant,
    pub ended: Instant,
}

impl ProfilingInfo {
    pub fn queued(&self) -> Duration {
        self.started.saturating_duration_since(self.submitted)
    }

    pub fn execution(&self) -> Duration {
        self.ended.saturating_duration_since(self.started)
    }
}

type Continuation = Box<dyn FnOnce(bool) + Send>;

struct EventState {
    status: EventStatus,
    error: Option<Error>,
    continuations: Vec<Continuation>,
    started: Option<Instant>,
    ended: Option<Instant>,
}

struct EventInner {
    id: u64,
    queue: Weak<QueueShared>,
    profiling: bool,
    submitted: Instant,
    state: Mutex<EventState>,
    finished: Condvar,
}

/// Handle to the completion of one submission. Cheap to clone.
#[derive(Clone)]
pub struct Event {
    inner: Arc<EventInner>,
}

impl Event {
    fn with_status(queue: Weak<QueueShared>, profiling: bool, status: EventStatus) -> Self {
        let now = Instant::now();
        let finished = status.is_finished();
        Self {
            inner: Arc::new(EventInner {
                id: NEXT_EVENT_ID.fetch_add(1, Ordering::Relaxed),
                queue,
                profiling,
                submitted: now,
                state: Mutex::new(EventState {
                    status,
                    error: None,
                    continuations: Vec::new(),
                    started: finished.then_some(now),
                    ended: finished.then_some(now),
                }),
                finished: Condvar::new(),
            }),
        }
    }

    pub(crate) fn pending(queue: Weak<QueueShared>, profiling: bool) -> Self {
        Self::with_status(queue, profiling, EventStatus::Pending)
    }

    /// An event that is already complete.
    pub fn completed() -> Self {
        Self::with_status(Weak::new(), false, EventStatus::Complete)
    }

    /// A running event finished by the host, used to hold a region for a host accessor.
    pub(crate) fn host_hold() -> Self {
        Self::with_status(Weak::new(), false, EventStatus::Running)
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn status(&self) -> EventStatus {
        self.inner.state.lock().status
    }

    pub fn is_finished(&self) -> bool {
        self.status().is_finished()
    }

    /// The failure recorded for this submission, if any.
    pub fn error(&self) -> Option<Error> {
        self.inner.state.lock().error.clone()
    }

    pub(crate) fn same_as(&self, other: &Event) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Block until the submission completes or fails.
    pub fn wait(&self) {
        let mut state = self.inner.state.lock();
        while !state.status.is_finished() {
            self.inner.finished.wait(&mut state);
        }
    }

    /// Wait, then hand the owning queue's pending asynchronous errors to its handler.
    pub fn wait_and_throw(&self) {
        self.wait();
        if let Some(queue) = self.inner.queue.upgrade() {
            queue.throw_asynchronous();
        }
    }

    pub fn wait_all(events: &[Event]) {
        for event in events {
            event.wait();
        }
    }

    pub fn profiling_info(&self) -> Result<ProfilingInfo> {
        if !self.inner.profiling {
            return Err(Error::profiling("the queue was not created with profiling enabled"));
        }
        let state = self.inner.state.lock();
        match (state.started, state.ended) {
            (Some(started), Some(ended)) => Ok(ProfilingInfo {
                submitted: self.inner.submitted,
                started,
                ended,
            }),
            _ => Err(Error::profiling(format!("event {} has not finished", self.inner.id))),
        }
    }

    pub(crate) fn set_status(&self, status: EventStatus) {
        let mut state = self.inner.state.lock();
        if status == EventStatus::Running {
            state.started = Some(Instant::now());
        }
        state.status = status;
    }

    /// Record the outcome, wake waiters and run continuations.
    pub(crate) fn finish(&self, outcome: Result<()>) {
        let (continuations, ok) = {
            let mut state = self.inner.state.lock();
            if state.status.is_finished() {
                return;
            }
            let now = Instant::now();
            state.started.get_or_insert(now);
            state.ended = Some(now);
            let ok = match outcome {
                Ok(()) => {
                    state.status = EventStatus::Complete;
                    true
                }
                Err(err) => {
                    state.status = EventStatus::Failed;
                    state.error = Some(err);
                    false
                }
            };
            (std::mem::take(&mut state.continuations), ok)
        };
        self.inner.finished.notify_all();
        for continuation in continuations {
            continuation(ok);
        }
    }

    /// Run `f(succeeded)` once the event finishes, immediately if it already has.
    pub(crate) fn on_finish(&self, f: impl FnOnce(bool) + Send + 'static) {
        let mut state = self.inner.state.lock();
        if state.status.is_finished() {
            let ok = state.status == EventStatus::Complete;
            drop(state);
            f(ok);
        } else {
            state.continuations.push(Box::new(f));
        }
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("id", &self.inner.id)
            .field("status", &self.status())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    #[test]
    fn completed_event_runs_continuations_immediately() {
        let event = Event::completed();
        assert_eq!(event.status(), EventStatus::Complete);
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        event.on_finish(move |ok| {
            assert!(ok);
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        event.wait();
    }

    #[test]
    fn wait_blocks_until_finish() {
        let event = Event::host_hold();
        let waiter = {
            let event = event.clone();
            thread::spawn(move || {
                event.wait();
                event.status()
            })
        };
        thread::sleep(Duration::from_millis(10));
        assert!(!event.is_finished());
        event.finish(Ok(()));
        assert_eq!(waiter.join().unwrap(), EventStatus::Complete);
    }

    #[test]
    fn failure_is_recorded_and_reported_to_continuations() {
        let event = Event::pending(Weak::new(), false);
        let outcome = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&outcome);
        event.on_finish(move |ok| *slot.lock() = Some(ok));
        event.finish(Err(Error::kernel("lane 3 panicked")));
        assert_eq!(*outcome.lock(), Some(false));
        assert_eq!(event.status(), EventStatus::Failed);
        assert!(event.error().is_some_and(|e| e.message().contains("lane 3")));

        event.finish(Ok(()));
        assert_eq!(event.status(), EventStatus::Failed);
    }

    #[test]
    fn profiling_requires_opt_in() {
        let event = Event::completed();
        assert_eq!(
            event.profiling_info().unwrap_err().kind(),
            crate::error::ErrorKind::Profiling
        );

        let event = Event::pending(Weak::new(), true);
        assert!(event.profiling_info().is_err());
        event.set_status(EventStatus::Running);
        event.finish(Ok(()));
        let info = event.profiling_info().unwrap();
        assert!(info.ended >= info.started);
        assert!(info.started >= info.submitted);
    }
}
