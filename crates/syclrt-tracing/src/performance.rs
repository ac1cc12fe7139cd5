//! Timing guards and standard performance events.
//!
//! ```rust
//! use syclrt_tracing::performance::{record_kernel_launch, PerformanceSpan};
//!
//! let span = PerformanceSpan::new("nd_range_dispatch", Some(50));
//! // ... dispatch ...
//! drop(span); // logged only if it took at least 50us
//!
//! record_kernel_launch("vector_add", 1024, 120);
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

use tracing::span::EnteredSpan;
use tracing::{Level, Span};

static ENABLED: AtomicBool = AtomicBool::new(true);
// u64::MAX encodes "no global threshold".
static GLOBAL_THRESHOLD_US: AtomicU64 = AtomicU64::new(u64::MAX);

/// Apply the performance part of a [`crate::TracingConfig`].
pub fn configure(enabled: bool, threshold_us: Option<u64>) {
    ENABLED.store(enabled, Ordering::Relaxed);
    GLOBAL_THRESHOLD_US.store(threshold_us.unwrap_or(u64::MAX), Ordering::Relaxed);
}

/// Whether performance spans currently report anything.
pub fn is_enabled() -> bool {
    ENABLED.load(Ordering::Relaxed)
}

fn global_threshold() -> Option<u64> {
    match GLOBAL_THRESHOLD_US.load(Ordering::Relaxed) {
        u64::MAX => None,
        value => Some(value),
    }
}

/// RAII timer over an entered span. Events emitted while the guard lives are attributed to the
/// span; on drop `performance_span_complete` is logged unless reporting is disabled or the run
/// stayed under the threshold.
///
/// The guard exits its span on drop, so it must stay on the thread that created it.
pub struct PerformanceSpan {
    name: String,
    threshold_us: Option<u64>,
    start: Instant,
    span: EnteredSpan,
}

impl PerformanceSpan {
    /// Start a debug-level span. `threshold_us` overrides the globally configured threshold.
    pub fn new(name: impl Into<String>, threshold_us: Option<u64>) -> Self {
        Self::with_level(Level::DEBUG, name, threshold_us)
    }

    pub fn with_level(level: Level, name: impl Into<String>, threshold_us: Option<u64>) -> Self {
        let name = name.into();
        let span = match level {
            Level::TRACE => tracing::trace_span!("perf", name = %name),
            Level::DEBUG => tracing::debug_span!("perf", name = %name),
            Level::INFO => tracing::info_span!("perf", name = %name),
            Level::WARN => tracing::warn_span!("perf", name = %name),
            Level::ERROR => tracing::error_span!("perf", name = %name),
        };
        Self::in_span(span, name, threshold_us)
    }

    /// Time the work done inside `span`, which is entered until the guard drops.
    pub fn in_span(span: Span, name: impl Into<String>, threshold_us: Option<u64>) -> Self {
        Self {
            name: name.into(),
            threshold_us: threshold_us.or_else(global_threshold),
            start: Instant::now(),
            span: span.entered(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn elapsed_us(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }
}

impl Drop for PerformanceSpan {
    fn drop(&mut self) {
        if !is_enabled() {
            return;
        }
        let elapsed_us = self.elapsed_us();
        if self.threshold_us.is_none_or(|threshold| elapsed_us >= threshold) {
            tracing::debug!(
                duration_us = elapsed_us,
                duration_ms = elapsed_us as f64 / 1000.0,
                "performance_span_complete"
            );
        }
    }
}

fn per_second(amount: usize, duration_us: u64) -> f64 {
    if duration_us == 0 {
        0.0
    } else {
        amount as f64 / duration_us as f64 * 1_000_000.0
    }
}

/// One kernel dispatch: how many work-items ran and how long it took.
pub fn record_kernel_launch(kernel: &str, work_items: usize, duration_us: u64) {
    tracing::debug!(
        event = "kernel_launch",
        kernel = kernel,
        work_items = work_items,
        duration_us = duration_us,
        items_per_sec = per_second(work_items, duration_us),
        "kernel_complete"
    );
}

/// A host/device copy. `direction` is `"H2D"`, `"D2H"` or `"D2D"`.
pub fn record_transfer(bytes: usize, direction: &str, duration_us: u64) {
    let bandwidth_mbps = per_second(bytes, duration_us) / (1024.0 * 1024.0);
    tracing::debug!(
        event = "transfer",
        bytes = bytes,
        direction = direction,
        duration_us = duration_us,
        bandwidth_mbps = bandwidth_mbps,
        "data_transfer"
    );
}

/// A runtime-owned allocation (buffer storage, local scratch, shared allocation).
pub fn record_allocation(bytes: usize, kind: &str, duration_us: u64) {
    tracing::debug!(
        event = "allocation",
        bytes = bytes,
        kind = kind,
        duration_us = duration_us,
        "memory_allocation"
    );
}

/// Element throughput of a host-side algorithm such as a reduction.
pub fn record_throughput(operation: &str, elements: usize, duration_us: u64) {
    let elements_per_sec = per_second(elements, duration_us);
    tracing::debug!(
        event = "throughput",
        operation = operation,
        elements = elements,
        duration_us = duration_us,
        elements_per_sec = elements_per_sec,
        "operation_throughput"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn span_keeps_name_and_threshold() {
        let span = PerformanceSpan::new("dispatch", Some(1000));
        assert_eq!(span.name(), "dispatch");
        assert_eq!(span.threshold_us, Some(1000));
    }

    #[test]
    fn span_is_current_until_the_guard_drops() {
        tracing::subscriber::with_default(tracing_subscriber::registry(), || {
            let guard = PerformanceSpan::new("scoped", None);
            assert_eq!(Span::current().id(), guard.span().id());
            assert!(!Span::current().is_none());
            drop(guard);
            assert!(Span::current().is_none());
        });
    }

    #[test]
    fn span_measures_elapsed_time() {
        let span = PerformanceSpan::with_level(Level::INFO, "sleep", None);
        thread::sleep(Duration::from_millis(5));
        assert!(span.elapsed_us() >= 5_000);
    }

    #[test]
    fn rate_helper_handles_zero_duration() {
        assert_eq!(per_second(4096, 0), 0.0);
        assert!((per_second(1_000_000, 1000) - 1_000_000_000.0).abs() < 1.0);
    }

    #[test]
    fn recorders_do_not_panic() {
        record_kernel_launch("fill", 256, 10);
        record_transfer(4096, "D2H", 3);
        record_allocation(1024, "buffer", 1);
        record_throughput("tree_reduce", 1024, 0);
    }
}
