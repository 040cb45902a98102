//! Constructs for handler return values and for observing task completion.
//!
//! Handlers may return anything implementing [`Reply`]. The reply is converted into an [`Envelope`] on the worker
//! thread: plain values are wrapped, `()` becomes an empty envelope, an [`Envelope`] is passed through untouched,
//! and a `Result` either unwraps into its success value or fails the task with [`TaskError::Handler`].
//!
//! Every [`Actor::send`](crate::actor::Actor::send) returns a [`CompletionHandle`]. The handle can be waited on
//! from a plain thread, polled without blocking, or awaited as a [`Future`] from async code.

use std::{
    collections::{BTreeMap, HashMap, HashSet, VecDeque},
    future::Future,
    path::PathBuf,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
    time::Duration,
};

use tokio::sync::oneshot::{self, error::TryRecvError};

use crate::{
    error::{BoxError, TaskError},
    message::Envelope,
};

/// The sending half of a completion handle, fulfilled exactly once by the worker running the task.
pub(crate) type ReplySender = oneshot::Sender<Result<Envelope, TaskError>>;

/// A value returned by an actor handler.
///
/// This is implemented for many std lib types, and can be implemented on custom types manually.
///
/// # Example
///
/// ```
/// use courier::{message::Envelope, reply::Reply, error::BoxError};
///
/// #[derive(Clone)]
/// struct Pong(u64);
///
/// impl Reply for Pong {
///     fn into_envelope(self) -> Result<Envelope, BoxError> {
///         Ok(Envelope::new(self))
///     }
/// }
/// ```
pub trait Reply: Send + 'static {
    /// Converts the reply into the envelope delivered to the completion handle.
    ///
    /// An `Err` fails the task with [`TaskError::Handler`].
    fn into_envelope(self) -> Result<Envelope, BoxError>;
}

impl Reply for Envelope {
    #[inline]
    fn into_envelope(self) -> Result<Envelope, BoxError> {
        Ok(self)
    }
}

impl Reply for () {
    #[inline]
    fn into_envelope(self) -> Result<Envelope, BoxError> {
        Ok(Envelope::empty())
    }
}

impl<T, E> Reply for Result<T, E>
where
    T: Reply,
    E: Into<BoxError> + Send + 'static,
{
    fn into_envelope(self) -> Result<Envelope, BoxError> {
        match self {
            Ok(value) => value.into_envelope(),
            Err(err) => Err(err.into()),
        }
    }
}

macro_rules! impl_value_reply {
    ([
        $(
            $( {
                $( $generics:tt )*
             } )?
            $ty:ty
        ),* $(,)?
    ]) => {
        $(
            impl $( < $($generics)* > )? Reply for $ty {
                #[inline]
                fn into_envelope(self) -> Result<Envelope, BoxError> {
                    Ok(Envelope::new(self))
                }
            }
        )*
    };
}

impl_value_reply!([
    usize,
    u8,
    u16,
    u32,
    u64,
    u128,
    isize,
    i8,
    i16,
    i32,
    i64,
    i128,
    f32,
    f64,
    char,
    bool,
    &'static str,
    String,
    PathBuf,
    Duration,
    {T: 'static + Clone + Send} Option<T>,
    {T: 'static + Send + Sync} Arc<T>,
    {T: 'static + Clone + Send} Vec<T>,
    {T: 'static + Clone + Send} VecDeque<T>,
    {T: 'static + Clone + Send} Box<T>,
    {const N: usize, T: 'static + Clone + Send} [T; N],
    {K: 'static + Clone + Send, V: 'static + Clone + Send} HashMap<K, V>,
    {K: 'static + Clone + Send, V: 'static + Clone + Send} BTreeMap<K, V>,
    {T: 'static + Clone + Send} HashSet<T>,
]);

/// A handle to the eventual outcome of a dispatched task.
///
/// The outcome is the handler's reply as an [`Envelope`], or a [`TaskError`] if the handler failed, panicked, or
/// the task was discarded before it ran.
///
/// # Example
///
/// ```
/// use courier::{actor::Actor, message::Envelope};
///
/// let doubler = Actor::new(|msg: Envelope| msg.downcast::<i32>().map(|n| n * 2));
/// let reply = doubler.send(Envelope::new(21)).wait().unwrap();
/// assert_eq!(reply.downcast::<i32>().unwrap(), 42);
/// ```
#[must_use = "the outcome of the task is lost if the handle is dropped"]
#[derive(Debug)]
pub struct CompletionHandle {
    rx: oneshot::Receiver<Result<Envelope, TaskError>>,
}

impl CompletionHandle {
    pub(crate) fn new() -> (ReplySender, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, CompletionHandle { rx })
    }

    /// A handle which resolves to [`TaskError::Discarded`] immediately.
    pub(crate) fn discarded() -> Self {
        let (_, handle) = CompletionHandle::new();
        handle
    }

    /// Blocks the current thread until the task has completed.
    ///
    /// # Panics
    ///
    /// This function panics if called within an asynchronous execution context. Use `.await` there instead.
    pub fn wait(self) -> Result<Envelope, TaskError> {
        self.rx
            .blocking_recv()
            .unwrap_or(Err(TaskError::Discarded))
    }

    /// Returns the outcome if the task has completed, or `None` while it is still pending.
    ///
    /// The outcome is handed out once. Later calls report [`TaskError::Discarded`].
    pub fn try_get(&mut self) -> Option<Result<Envelope, TaskError>> {
        match self.rx.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Closed) => Some(Err(TaskError::Discarded)),
        }
    }
}

impl Future for CompletionHandle {
    type Output = Result<Envelope, TaskError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|res| res.unwrap_or(Err(TaskError::Discarded)))
    }
}
