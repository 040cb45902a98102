//! Defines error handling constructs for courier.
//!
//! Errors fall into two groups. Synchronous misuse is reported at the call which caused it: a malformed
//! multicast pattern, an empty registry address, or dispatching to a pool which has already shut down.
//! Asynchronous failures, such as a handler returning an error, a handler panicking, or a task being
//! discarded by an immediate shutdown, only ever surface through the task's
//! [`CompletionHandle`](crate::reply::CompletionHandle).
//!
//! Channel errors hand the rejected value back to the caller, so a timed out push never loses data.

use std::{any::Any, error, fmt, sync::Arc};

use parking_lot::Mutex;
use thiserror::Error;

/// A dyn boxed error.
pub type BoxError = Box<dyn error::Error + Send + Sync + 'static>;

/// Error returned by [`BoundedChannel::push`](crate::mailbox::BoundedChannel::push).
///
/// The channel was closed, and the value is handed back.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PushError<T>(pub T);

impl<T> PushError<T> {
    /// Returns the value which could not be pushed.
    pub fn into_inner(self) -> T {
        self.0
    }
}

/// Error returned by [`BoundedChannel::try_push`](crate::mailbox::BoundedChannel::try_push).
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum TryPushError<T> {
    /// The channel is at capacity and pushing would require blocking.
    Full(T),
    /// The channel was closed.
    Closed(T),
}

impl<T> TryPushError<T> {
    /// Returns the value which could not be pushed.
    pub fn into_inner(self) -> T {
        match self {
            TryPushError::Full(value) | TryPushError::Closed(value) => value,
        }
    }
}

/// Error returned by [`BoundedChannel::push_timeout`](crate::mailbox::BoundedChannel::push_timeout).
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum PushTimeoutError<T> {
    /// The channel stayed at capacity until the timeout elapsed.
    Timeout(T),
    /// The channel was closed.
    Closed(T),
}

impl<T> PushTimeoutError<T> {
    /// Returns the value which could not be pushed.
    pub fn into_inner(self) -> T {
        match self {
            PushTimeoutError::Timeout(value) | PushTimeoutError::Closed(value) => value,
        }
    }

    /// Returns `true` if the push gave up because the timeout elapsed.
    pub fn is_timeout(&self) -> bool {
        matches!(self, PushTimeoutError::Timeout(_))
    }
}

/// Error returned by [`BoundedChannel::pop_timeout`](crate::mailbox::BoundedChannel::pop_timeout).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Error)]
pub enum PopTimeoutError {
    /// The channel stayed empty until the timeout elapsed.
    #[error("timed out waiting for a value")]
    Timeout,
    /// The channel is closed and has been drained.
    #[error("channel closed")]
    Closed,
}

impl<T> fmt::Debug for PushError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PushError(..)")
    }
}

impl<T> fmt::Display for PushError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "channel closed")
    }
}

impl<T> error::Error for PushError<T> {}

impl<T> fmt::Debug for TryPushError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TryPushError::Full(_) => write!(f, "Full(..)"),
            TryPushError::Closed(_) => write!(f, "Closed(..)"),
        }
    }
}

impl<T> fmt::Display for TryPushError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TryPushError::Full(_) => write!(f, "channel full"),
            TryPushError::Closed(_) => write!(f, "channel closed"),
        }
    }
}

impl<T> error::Error for TryPushError<T> {}

impl<T> fmt::Debug for PushTimeoutError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PushTimeoutError::Timeout(_) => write!(f, "Timeout(..)"),
            PushTimeoutError::Closed(_) => write!(f, "Closed(..)"),
        }
    }
}

impl<T> fmt::Display for PushTimeoutError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PushTimeoutError::Timeout(_) => write!(f, "timed out waiting for capacity"),
            PushTimeoutError::Closed(_) => write!(f, "channel closed"),
        }
    }
}

impl<T> error::Error for PushTimeoutError<T> {}

/// Error returned when a task cannot be handed to a [`WorkerPool`](crate::actor::pool::WorkerPool).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Error)]
pub enum DispatchError {
    /// The pool has begun shutting down and accepts no further work.
    #[error("worker pool is shut down")]
    ShutDown,
}

/// Error extracting a value from an [`Envelope`](crate::message::Envelope).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Error)]
pub enum EnvelopeError {
    /// The envelope holds no value.
    #[error("envelope is empty")]
    Empty,
    /// The envelope holds a value of a different type.
    #[error("type mismatch: expected `{expected}`, envelope holds `{found}`")]
    TypeMismatch {
        /// The type which was requested.
        expected: &'static str,
        /// The type actually held.
        found: &'static str,
    },
}

/// Error parsing a wildcard pattern used for multicast routing.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Error)]
pub enum PatternError {
    /// The pattern was an empty string.
    #[error("pattern is empty")]
    Empty,
    /// A segment between two separators was empty.
    #[error("pattern `{pattern}` has an empty segment at position {position}")]
    EmptySegment {
        /// The offending pattern.
        pattern: String,
        /// Zero-based index of the empty segment.
        position: usize,
    },
    /// The multi-level wildcard `#` appeared before the final segment.
    #[error("`#` must be the final segment, found at position {position} of `{pattern}`")]
    MisplacedMultiLevel {
        /// The offending pattern.
        pattern: String,
        /// Zero-based index of the misplaced `#`.
        position: usize,
    },
}

/// An error that can occur when registering actors by address.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Error)]
pub enum RegistryError {
    /// Addresses must be non-empty.
    #[error("actor address is empty")]
    EmptyAddress,
}

/// The failure outcome of a dispatched task, as observed through its completion handle.
#[derive(Debug, Error)]
pub enum TaskError {
    /// The handler returned an error.
    #[error("handler failed: {0}")]
    Handler(BoxError),
    /// The handler panicked. The worker thread survived.
    #[error("{0}")]
    Panicked(PanicError),
    /// The task never ran: it was dropped by an immediate shutdown, or its pool was already shut down.
    #[error("task discarded before it ran")]
    Discarded,
}

impl TaskError {
    /// Returns `true` if the task was discarded without running.
    pub fn is_discarded(&self) -> bool {
        matches!(self, TaskError::Discarded)
    }
}

/// A shared error that occurs when a handler or task panics.
///
/// Holds the panic payload so it can be inspected after the worker recovered.
#[derive(Clone)]
pub struct PanicError(Arc<Mutex<Box<dyn Any + Send>>>);

impl PanicError {
    /// Creates a new PanicError from a generic error.
    pub fn new<E>(err: E) -> Self
    where
        E: Send + 'static,
    {
        PanicError(Arc::new(Mutex::new(Box::new(err))))
    }

    /// Creates a new PanicError from a boxed panic payload.
    pub fn new_boxed(err: Box<dyn Any + Send>) -> Self {
        PanicError(Arc::new(Mutex::new(err)))
    }

    /// Calls the passed closure `f` with the panic message, or returns `None` if the payload is not a string.
    pub fn with_str<F, R>(&self, f: F) -> Option<R>
    where
        F: FnOnce(&str) -> R,
    {
        let lock = self.0.lock();
        lock.downcast_ref::<&'static str>()
            .copied()
            .or_else(|| lock.downcast_ref::<String>().map(String::as_str))
            .map(f)
    }

    /// Calls the passed closure `f` with the inner type downcasted into `T`, otherwise returns `None`.
    pub fn with_downcast_ref<T, F, R>(&self, f: F) -> Option<R>
    where
        T: 'static,
        F: FnOnce(&T) -> R,
    {
        let lock = self.0.lock();
        lock.downcast_ref().map(f)
    }
}

impl fmt::Debug for PanicError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PanicError")
            .field(&self.with_str(str::to_owned))
            .finish()
    }
}

impl fmt::Display for PanicError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Types are strings if panicked with the `std::panic!` macro
        match self.with_str(str::to_owned) {
            Some(s) => write!(f, "panicked: {s}"),
            None => write!(f, "panicked"),
        }
    }
}

impl error::Error for PanicError {}
