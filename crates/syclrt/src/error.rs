//! Error taxonomy for the runtime.
//!
//! Every failure is one [`Error`] value tagged with an [`ErrorKind`]. Synchronous usage errors
//! (bad launch shapes, out-of-bounds accessors) are returned from the call that detected them.
//! Failures while a kernel runs are collected per queue and handed to the queue's
//! [`AsyncHandler`] as an [`ExceptionList`] at the next synchronisation point.

use std::fmt;
use std::panic::Location;
use std::sync::Arc;

/// Result type used throughout the runtime.
pub type Result<T> = std::result::Result<T, Error>;

/// Callback receiving the asynchronous errors captured by a queue.
pub type AsyncHandler = Arc<dyn Fn(ExceptionList) + Send + Sync>;

/// The two top-level branches of the taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorBranch {
    Runtime,
    Device,
}

/// What went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// General enqueue or runtime failure.
    Runtime,
    /// A kernel failed (panicked) while executing.
    Kernel,
    /// An accessor could not be created or used.
    Accessor,
    /// An nd-range launch shape is invalid.
    NdRange,
    /// An event could not be waited on or its dependency failed.
    Event,
    /// An argument was outside its valid domain.
    InvalidParameter,
    /// General device failure.
    Device,
    CompileProgram,
    LinkProgram,
    InvalidObject,
    MemoryAllocation,
    Platform,
    Profiling,
    FeatureNotSupported,
}

impl ErrorKind {
    /// Branch of the taxonomy this kind belongs to.
    pub const fn branch(self) -> ErrorBranch {
        match self {
            ErrorKind::Runtime
            | ErrorKind::Kernel
            | ErrorKind::Accessor
            | ErrorKind::NdRange
            | ErrorKind::Event
            | ErrorKind::InvalidParameter => ErrorBranch::Runtime,
            ErrorKind::Device
            | ErrorKind::CompileProgram
            | ErrorKind::LinkProgram
            | ErrorKind::InvalidObject
            | ErrorKind::MemoryAllocation
            | ErrorKind::Platform
            | ErrorKind::Profiling
            | ErrorKind::FeatureNotSupported => ErrorBranch::Device,
        }
    }

    pub const fn is_runtime_error(self) -> bool {
        matches!(self.branch(), ErrorBranch::Runtime)
    }

    pub const fn is_device_error(self) -> bool {
        matches!(self.branch(), ErrorBranch::Device)
    }

    /// Stable internal code reported alongside the message.
    pub const fn code(self) -> i32 {
        match self {
            ErrorKind::Runtime => 1,
            ErrorKind::Kernel => 2,
            ErrorKind::Accessor => 3,
            ErrorKind::NdRange => 4,
            ErrorKind::Event => 5,
            ErrorKind::InvalidParameter => 6,
            ErrorKind::Device => 100,
            ErrorKind::CompileProgram => 101,
            ErrorKind::LinkProgram => 102,
            ErrorKind::InvalidObject => 103,
            ErrorKind::MemoryAllocation => 104,
            ErrorKind::Platform => 105,
            ErrorKind::Profiling => 106,
            ErrorKind::FeatureNotSupported => 107,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Runtime => "runtime error",
            ErrorKind::Kernel => "kernel error",
            ErrorKind::Accessor => "accessor error",
            ErrorKind::NdRange => "nd_range error",
            ErrorKind::Event => "event error",
            ErrorKind::InvalidParameter => "invalid parameter",
            ErrorKind::Device => "device error",
            ErrorKind::CompileProgram => "compile program error",
            ErrorKind::LinkProgram => "link program error",
            ErrorKind::InvalidObject => "invalid object",
            ErrorKind::MemoryAllocation => "memory allocation error",
            ErrorKind::Platform => "platform error",
            ErrorKind::Profiling => "profiling error",
            ErrorKind::FeatureNotSupported => "feature not supported",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// File and line where an error was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: &'static str,
    pub line: u32,
}

impl SourceLocation {
    #[track_caller]
    pub fn caller() -> Self {
        let location = Location::caller();
        Self {
            file: location.file(),
            line: location.line(),
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// A structured error record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message} (code {code}, at {location})")]
pub struct Error {
    kind: ErrorKind,
    message: String,
    location: SourceLocation,
    code: i32,
    device: Option<String>,
}

impl Error {
    #[track_caller]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            location: SourceLocation::caller(),
            code: kind.code(),
            device: None,
        }
    }

    #[track_caller]
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Runtime, message)
    }

    #[track_caller]
    pub fn kernel(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Kernel, message)
    }

    #[track_caller]
    pub fn accessor(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Accessor, message)
    }

    #[track_caller]
    pub fn nd_range(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NdRange, message)
    }

    #[track_caller]
    pub fn event(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Event, message)
    }

    #[track_caller]
    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidParameter, message)
    }

    #[track_caller]
    pub fn platform(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Platform, message)
    }

    #[track_caller]
    pub fn profiling(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Profiling, message)
    }

    #[track_caller]
    pub fn feature_not_supported(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::FeatureNotSupported, message)
    }

    /// Attach the name of the device the error originated on.
    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.device = Some(device.into());
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn location(&self) -> SourceLocation {
        self.location
    }

    pub fn code(&self) -> i32 {
        self.code
    }

    pub fn device(&self) -> Option<&str> {
        self.device.as_deref()
    }

    pub fn has_device_context(&self) -> bool {
        self.device.is_some()
    }

    /// Build a kernel error from a caught panic payload.
    #[track_caller]
    pub(crate) fn from_panic(kernel: &str, payload: &(dyn std::any::Any + Send)) -> Self {
        let reason = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        Self::kernel(format!("kernel `{kernel}` panicked: {reason}"))
    }
}

/// Errors delivered together to an [`AsyncHandler`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExceptionList {
    errors: Vec<Error>,
}

impl ExceptionList {
    pub fn new(errors: Vec<Error>) -> Self {
        Self { errors }
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Error> {
        self.errors.iter()
    }

    pub fn into_vec(self) -> Vec<Error> {
        self.errors
    }
}

impl IntoIterator for ExceptionList {
    type Item = Error;
    type IntoIter = std::vec::IntoIter<Error>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl<'a> IntoIterator for &'a ExceptionList {
    type Item = &'a Error;
    type IntoIter = std::slice::Iter<'a, Error>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}
