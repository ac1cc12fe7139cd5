//! Instrumentation shorthands used across the runtime.

/// Start a [`crate::performance::PerformanceSpan`]. Fields are recorded on its span, which stays
/// entered until the guard drops.
///
/// ```rust
/// use syclrt_tracing::perf_span;
///
/// let _span = perf_span!("nd_range_dispatch", groups = 4, lanes = 256);
/// ```
#[macro_export]
macro_rules! perf_span {
    ($name:expr) => {{
        $crate::performance::PerformanceSpan::new($name, None)
    }};
    ($name:expr, $($field:tt = $value:expr),+ $(,)?) => {{
        $crate::performance::PerformanceSpan::in_span(
            $crate::tracing::debug_span!("perf", name = $name, $($field = $value),+),
            $name,
            None,
        )
    }};
}

/// Like [`perf_span!`] with an explicit microsecond threshold.
#[macro_export]
macro_rules! perf_span_threshold {
    ($name:expr, $threshold_us:expr) => {{
        $crate::performance::PerformanceSpan::new($name, Some($threshold_us))
    }};
    ($name:expr, $threshold_us:expr, $($field:tt = $value:expr),+ $(,)?) => {{
        $crate::performance::PerformanceSpan::in_span(
            $crate::tracing::debug_span!("perf", name = $name, $($field = $value),+),
            $name,
            Some($threshold_us),
        )
    }};
}

/// Emit a debug event tagged with `event = name`.
///
/// ```rust
/// use syclrt_tracing::perf_event;
///
/// perf_event!("buffer_writeback", bytes = 4096, elements = 1024);
/// ```
#[macro_export]
macro_rules! perf_event {
    ($name:expr, $($field:tt = $value:expr),+ $(,)?) => {
        $crate::tracing::debug!(event = $name, $($field = $value),+)
    };
}

/// Evaluate a block and return `(value, elapsed_microseconds)`.
///
/// ```rust
/// use syclrt_tracing::timed_block;
///
/// let (sum, _us) = timed_block!("host_sum", { (1..=64).sum::<u32>() });
/// assert_eq!(sum, 2080);
/// ```
#[macro_export]
macro_rules! timed_block {
    ($name:expr, $block:block) => {{
        let start = std::time::Instant::now();
        let result = $block;
        let duration_us = start.elapsed().as_micros() as u64;
        $crate::tracing::debug!(operation = $name, duration_us = duration_us, "timed_block_complete");
        (result, duration_us)
    }};
}
