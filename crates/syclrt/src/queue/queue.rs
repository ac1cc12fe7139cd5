use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use syclrt_tracing::perf_span_threshold;
use syclrt_tracing::performance::{record_allocation, record_kernel_launch};
use tracing::{debug, warn};

use super::handler::{CommandGroup, KernelCommand};
use super::registry::{KernelDescriptor, KernelRegistry};
use super::{Event, EventStatus, Handler};
use crate::backend::{Executor, LocalMemory};
use crate::device::{select_device, Aspect, Device, Selector};
use crate::error::{AsyncHandler, Error, ExceptionList, Result};
use crate::index::Range;
use crate::item::Item;
use crate::memory::{Element, LocalDecl, SharedAllocation};

static NEXT_QUEUE_ID: AtomicU64 = AtomicU64::new(1);

/// Kernel runs shorter than this are not reported as performance spans.
const KERNEL_SPAN_THRESHOLD_US: u64 = 100;

thread_local! {
    /// Commands released on this thread, waiting for the outermost `release` to dispatch them.
    static RELEASED: RefCell<VecDeque<(ReadyCommand, bool)>> = const { RefCell::new(VecDeque::new()) };
    static DRAINING: Cell<bool> = const { Cell::new(false) };
}

pub(crate) struct QueueShared {
    id: u64,
    device: Device,
    executor: Arc<dyn Executor>,
    async_handler: Option<AsyncHandler>,
    in_order: bool,
    profiling: bool,
    pending_errors: Mutex<Vec<Error>>,
    outstanding: Mutex<Vec<Event>>,
    last_event: Mutex<Option<Event>>,
    registry: KernelRegistry,
}

/// A kernel whose dependencies are still running.
struct PendingCommand {
    remaining: AtomicUsize,
    dependency_failed: AtomicBool,
    ready: Mutex<Option<ReadyCommand>>,
}

struct ReadyCommand {
    queue: Arc<QueueShared>,
    event: Event,
    command: u64,
    locals: Vec<LocalDecl>,
    kernel: Option<(KernelCommand, Arc<KernelDescriptor>)>,
}

impl PendingCommand {
    fn arrive(&self, ok: bool) {
        if !ok {
            self.dependency_failed.store(true, Ordering::Release);
        }
        if self.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
            let ready = self.ready.lock().take();
            if let Some(ready) = ready {
                release(ready, self.dependency_failed.load(Ordering::Acquire));
            }
        }
    }
}

/// Dispatch `ready` once no dispatch is running further up this thread's stack.
///
/// Commands released while finishing an event are queued and dispatched by the outermost caller,
/// so the stack depth stays constant along a chain of dependents.
fn release(ready: ReadyCommand, dependency_failed: bool) {
    RELEASED.with(|released| released.borrow_mut().push_back((ready, dependency_failed)));
    if DRAINING.with(|draining| draining.replace(true)) {
        return;
    }
    while let Some((ready, dependency_failed)) = RELEASED.with(|released| released.borrow_mut().pop_front()) {
        ready.dispatch(dependency_failed);
    }
    DRAINING.with(|draining| draining.set(false));
}

impl ReadyCommand {
    fn dispatch(self, dependency_failed: bool) {
        if dependency_failed {
            let error = Error::event(format!(
                "command group {} was not run because one of its dependencies failed",
                self.command
            ))
            .with_device(self.queue.device.name());
            debug!(command = self.command, "skipping command group after failed dependency");
            self.event.finish(Err(error));
            return;
        }

        let Some((kernel, descriptor)) = self.kernel else {
            self.event.finish(Ok(()));
            return;
        };

        self.event.set_status(EventStatus::Scheduled);
        let executor = Arc::clone(&self.queue.executor);
        let spawner = Arc::clone(&executor);
        let (queue, event, command, locals) = (self.queue, self.event, self.command, self.locals);
        let failed_event = event.clone();
        let failed_queue = Arc::clone(&queue);

        let spawned = spawner.spawn(Box::new(move || {
            event.set_status(EventStatus::Running);
            let KernelCommand { key, work_items, launch } = kernel;
            let start = Instant::now();
            let outcome = {
                let _span = perf_span_threshold!(
                    "kernel_run",
                    KERNEL_SPAN_THRESHOLD_US,
                    command = command,
                    work_items = work_items
                );
                panic::catch_unwind(AssertUnwindSafe(|| launch(&*executor, LocalMemory { command, decls: &locals })))
                    .unwrap_or_else(|payload| Err(Error::from_panic(&key.name, &*payload)))
            };
            let duration_us = start.elapsed().as_micros() as u64;

            match outcome {
                Ok(()) => {
                    descriptor.record_launch();
                    record_kernel_launch(&key.name, work_items, duration_us);
                    debug!(kernel = %key, command, duration_us, "kernel complete");
                    event.finish(Ok(()));
                }
                Err(err) => {
                    let err = err.with_device(queue.device.name());
                    debug!(kernel = %key, command, error = %err, "kernel failed");
                    queue.report(err.clone());
                    event.finish(Err(err));
                }
            }
        }));

        if let Err(err) = spawned {
            let err = err.with_device(failed_queue.device.name());
            failed_queue.report(err.clone());
            failed_event.finish(Err(err));
        }
    }
}

impl QueueShared {
    fn report(&self, error: Error) {
        self.pending_errors.lock().push(error);
    }

    /// Hand every pending asynchronous error to the handler, or drop them with a warning.
    pub(crate) fn throw_asynchronous(&self) {
        let errors = std::mem::take(&mut *self.pending_errors.lock());
        if errors.is_empty() {
            return;
        }
        match &self.async_handler {
            Some(handler) => handler(ExceptionList::new(errors)),
            None => warn!(
                queue = self.id,
                count = errors.len(),
                first = %errors[0],
                "asynchronous errors discarded: no async handler registered"
            ),
        }
    }

    fn enqueue(self: &Arc<Self>, group: CommandGroup) -> Result<Event> {
        let CommandGroup {
            command,
            requests,
            locals,
            mut dependencies,
            kernel,
        } = group;

        let event = Event::pending(Arc::downgrade(self), self.profiling);
        if self.in_order {
            if let Some(previous) = self.last_event.lock().replace(event.clone()) {
                dependencies.push(previous);
            }
        }
        for request in &requests {
            dependencies.extend(request.tracker.register(request.range, request.mode, &event));
        }

        let kernel = kernel.map(|kernel| {
            let descriptor = self
                .registry
                .get_or_register(&kernel.key, || requests.iter().map(|request| request.descriptor).collect());
            (kernel, descriptor)
        });
        debug!(
            queue = self.id,
            command,
            kernel = %kernel.as_ref().map_or("<none>".to_string(), |(k, _)| k.key.to_string()),
            accesses = requests.len(),
            dependencies = dependencies.len(),
            "command group submitted"
        );

        {
            let mut outstanding = self.outstanding.lock();
            // Prune only when the vector would otherwise grow.
            if outstanding.len() == outstanding.capacity() {
                outstanding.retain(|event| !event.is_finished());
            }
            outstanding.push(event.clone());
        }

        let pending = Arc::new(PendingCommand {
            remaining: AtomicUsize::new(dependencies.len() + 1),
            dependency_failed: AtomicBool::new(false),
            ready: Mutex::new(Some(ReadyCommand {
                queue: Arc::clone(self),
                event: event.clone(),
                command,
                locals,
                kernel,
            })),
        });
        for dependency in &dependencies {
            let pending = Arc::clone(&pending);
            dependency.on_finish(move |ok| pending.arrive(ok));
        }
        pending.arrive(true);

        Ok(event)
    }
}

impl Drop for QueueShared {
    fn drop(&mut self) {
        let lost = self.pending_errors.get_mut().len();
        if lost > 0 {
            warn!(queue = self.id, count = lost, "queue dropped with unreported asynchronous errors");
        }
    }
}

/// Configures a [`Queue`] for a specific device.
pub struct QueueBuilder {
    device: Device,
    async_handler: Option<AsyncHandler>,
    in_order: bool,
    profiling: bool,
}

impl QueueBuilder {
    pub fn async_handler(mut self, handler: AsyncHandler) -> Self {
        self.async_handler = Some(handler);
        self
    }

    /// Make every submission depend on the previous one.
    pub fn in_order(mut self) -> Self {
        self.in_order = true;
        self
    }

    /// Record submission, start and end times on every event.
    pub fn enable_profiling(mut self) -> Self {
        self.profiling = true;
        self
    }

    pub fn build(self) -> Result<Queue> {
        if self.profiling && !self.device.has(Aspect::QueueProfiling) {
            return Err(Error::feature_not_supported(format!(
                "{} does not support queue profiling",
                self.device.name()
            )));
        }
        let executor = self.device.executor()?;
        let id = NEXT_QUEUE_ID.fetch_add(1, Ordering::Relaxed);
        debug!(
            queue = id,
            device = %self.device,
            in_order = self.in_order,
            profiling = self.profiling,
            "queue created"
        );
        Ok(Queue {
            shared: Arc::new(QueueShared {
                id,
                device: self.device,
                executor,
                async_handler: self.async_handler,
                in_order: self.in_order,
                profiling: self.profiling,
                pending_errors: Mutex::new(Vec::new()),
                outstanding: Mutex::new(Vec::new()),
                last_event: Mutex::new(None),
                registry: KernelRegistry::new(),
            }),
        })
    }
}

/// Submission channel to one device. Clones share the same queue.
#[derive(Clone)]
pub struct Queue {
    shared: Arc<QueueShared>,
}

impl Queue {
    /// Queue on the device chosen by `selector`, without an async handler.
    pub fn new(selector: &Selector) -> Result<Self> {
        Self::builder(select_device(selector)?).build()
    }

    /// Queue on the device chosen by `selector`; asynchronous errors go to `handler`.
    pub fn with_handler(selector: &Selector, handler: AsyncHandler) -> Result<Self> {
        Self::builder(select_device(selector)?).async_handler(handler).build()
    }

    pub fn builder(device: Device) -> QueueBuilder {
        QueueBuilder {
            device,
            async_handler: None,
            in_order: false,
            profiling: false,
        }
    }

    pub fn id(&self) -> u64 {
        self.shared.id
    }

    pub fn device(&self) -> &Device {
        &self.shared.device
    }

    pub fn is_in_order(&self) -> bool {
        self.shared.in_order
    }

    pub fn is_profiling_enabled(&self) -> bool {
        self.shared.profiling
    }

    /// Build a command group with `cgf` and enqueue it.
    ///
    /// Errors returned by `cgf`, such as an invalid nd-range or an out-of-bounds accessor, fail the
    /// call and nothing is enqueued. Errors raised while the kernel runs are delivered
    /// asynchronously; see [`Queue::wait_and_throw`].
    #[tracing::instrument(skip_all, fields(queue = self.shared.id))]
    pub fn submit<F>(&self, cgf: F) -> Result<Event>
    where
        F: FnOnce(&mut Handler) -> Result<()>,
    {
        let mut handler = Handler::new(self.shared.device.clone());
        cgf(&mut handler)?;
        self.shared.enqueue(handler.into_command_group())
    }

    /// Block until every submission made so far has finished.
    #[tracing::instrument(skip_all, fields(queue = self.shared.id))]
    pub fn wait(&self) {
        let outstanding = self.shared.outstanding.lock().clone();
        Event::wait_all(&outstanding);
        self.shared.outstanding.lock().retain(|event| !event.is_finished());
    }

    /// [`Queue::wait`], then [`Queue::throw_asynchronous`].
    pub fn wait_and_throw(&self) {
        self.wait();
        self.throw_asynchronous();
    }

    /// Deliver the errors collected since the last call to the async handler. Without a handler
    /// they are logged and dropped.
    pub fn throw_asynchronous(&self) {
        self.shared.throw_asynchronous();
    }

    /// Registered kernels called `name`, with their launch counts.
    pub fn kernel_stats(&self, name: &str) -> Vec<Arc<KernelDescriptor>> {
        self.shared.registry.find_by_name(name)
    }

    pub fn registry(&self) -> &KernelRegistry {
        &self.shared.registry
    }

    /// Submit a basic data-parallel kernel.
    pub fn parallel_for<const N: usize, F>(&self, range: Range<N>, kernel: F) -> Result<Event>
    where
        F: Fn(Item<N>) + Send + Sync + 'static,
    {
        self.submit(|h| h.parallel_for(range, kernel))
    }

    /// Submit a basic data-parallel kernel that starts after `dependencies`.
    pub fn parallel_for_after<const N: usize, F>(&self, range: Range<N>, dependencies: &[Event], kernel: F) -> Result<Event>
    where
        F: Fn(Item<N>) + Send + Sync + 'static,
    {
        self.submit(|h| {
            h.depends_on_all(dependencies);
            h.parallel_for(range, kernel)
        })
    }

    pub fn single_task<F>(&self, kernel: F) -> Result<Event>
    where
        F: FnOnce() + Send + 'static,
    {
        self.submit(|h| h.single_task(kernel))
    }

    /// Allocate `count` zeroed elements visible to the host and to kernels on this queue's
    /// device. Ordering between their users is up to explicit event dependencies.
    pub fn malloc_shared<T: Element>(&self, count: usize) -> Result<SharedAllocation<T>> {
        if !self.device().has(Aspect::UsmSharedAllocations) {
            return Err(Error::feature_not_supported(format!(
                "{} does not support shared allocations",
                self.device().name()
            )));
        }
        let start = Instant::now();
        let allocation = SharedAllocation::zeroed(count);
        record_allocation(allocation.byte_len(), "shared", start.elapsed().as_micros() as u64);
        Ok(allocation)
    }
}

impl fmt::Debug for Queue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Queue")
            .field("id", &self.shared.id)
            .field("device", &self.shared.device)
            .field("in_order", &self.shared.in_order)
            .finish()
    }
}
