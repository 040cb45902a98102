//! Actors: message handlers bound to the worker pool which executes them.
//!
//! An [`Actor`] pairs a handler function with a [`WorkerPool`]. Sending a message wraps the envelope and the
//! handler into a task, queues it on the pool and immediately returns a [`CompletionHandle`] for the reply.
//!
//! # Isolation
//!
//! An actor created with [`Actor::new`] or [`Actor::with_config`] owns an exclusive pool. With a single worker
//! thread its messages are handled one at a time, in the order they were sent, so the handler never runs
//! concurrently with itself. [`Actor::is_isolated`] reports whether this guarantee holds.
//!
//! Actors may instead share one pool with [`Actor::with_pool`]. They then compete for the pool's workers, and
//! a handler may run on several threads at once. Handlers used this way must tolerate concurrent invocation.
//!
//! # Failures
//!
//! A handler which returns an error or panics fails only its own task: the failure is delivered through the
//! completion handle as [`TaskError::Handler`] or [`TaskError::Panicked`], and the worker moves on to the next
//! message.

mod id;
pub mod pool;

use std::{
    fmt,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

use tracing::{debug, error, warn};

use crate::{
    config::{PoolConfig, ShutdownMode},
    error::{BoxError, PanicError, TaskError},
    message::Envelope,
    reply::{CompletionHandle, Reply},
};

pub use id::*;
pub use pool::WorkerPool;

type Handler = dyn Fn(Envelope) -> Result<Envelope, BoxError> + Send + Sync + 'static;

/// A message handler executed on a worker pool.
///
/// # Example
///
/// ```
/// use courier::{actor::Actor, message::Envelope};
///
/// let greeter = Actor::new(|msg: Envelope| {
///     let name = msg.downcast::<String>()?;
///     Ok::<_, courier::error::EnvelopeError>(format!("Hello, {name}!"))
/// });
///
/// let reply = greeter.send(Envelope::new(String::from("Ferris"))).wait()?;
/// assert_eq!(reply.downcast::<String>()?, "Hello, Ferris!");
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct Actor {
    id: ActorId,
    handler: Arc<Handler>,
    pool: Arc<WorkerPool>,
    exclusive: bool,
}

impl Actor {
    /// Creates an isolated actor with its own single-threaded pool.
    pub fn new<F, R>(handler: F) -> Self
    where
        F: Fn(Envelope) -> R + Send + Sync + 'static,
        R: Reply,
    {
        Actor::with_config(PoolConfig::default(), handler)
    }

    /// Creates an actor with its own pool built from `config`.
    ///
    /// The actor is isolated only if `config` asks for a single thread.
    pub fn with_config<F, R>(config: PoolConfig, handler: F) -> Self
    where
        F: Fn(Envelope) -> R + Send + Sync + 'static,
        R: Reply,
    {
        Actor::build(Arc::new(WorkerPool::with_config(config)), true, handler)
    }

    /// Creates an actor running on a pool shared with other actors.
    ///
    /// Such an actor is never isolated.
    pub fn with_pool<F, R>(pool: Arc<WorkerPool>, handler: F) -> Self
    where
        F: Fn(Envelope) -> R + Send + Sync + 'static,
        R: Reply,
    {
        Actor::build(pool, false, handler)
    }

    fn build<F, R>(pool: Arc<WorkerPool>, exclusive: bool, handler: F) -> Self
    where
        F: Fn(Envelope) -> R + Send + Sync + 'static,
        R: Reply,
    {
        let id = ActorId::generate();
        debug!(%id, exclusive, threads = pool.threads(), "actor created");

        Actor {
            id,
            handler: Arc::new(move |msg: Envelope| handler(msg).into_envelope()),
            pool,
            exclusive,
        }
    }

    /// Returns the actor's identifier.
    pub fn id(&self) -> ActorId {
        self.id
    }

    /// Returns the pool executing this actor's messages.
    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    /// Returns `true` if messages are guaranteed to be handled one at a time, in send order.
    pub fn is_isolated(&self) -> bool {
        self.exclusive && self.pool.threads() == 1
    }

    /// Sends a message to the actor, returning a handle to its reply.
    ///
    /// Blocks only while the pool's queue is at capacity. If the pool has shut down, the message is dropped and
    /// the returned handle reports [`TaskError::Discarded`].
    pub fn send(&self, msg: Envelope) -> CompletionHandle {
        let (tx, handle) = CompletionHandle::new();
        let handler = self.handler.clone();
        let id = self.id;

        let res = self.pool.dispatch(move || {
            let outcome = match panic::catch_unwind(AssertUnwindSafe(|| handler(msg))) {
                Ok(Ok(reply)) => Ok(reply),
                Ok(Err(err)) => {
                    debug!(%id, %err, "handler returned an error");
                    Err(TaskError::Handler(err))
                }
                Err(payload) => {
                    let err = PanicError::new_boxed(payload);
                    error!(%id, %err, "handler panicked");
                    Err(TaskError::Panicked(err))
                }
            };
            // The caller may have dropped the handle
            let _ = tx.send(outcome);
        });
        if let Err(err) = res {
            warn!(%id, %err, "message discarded");
        }

        handle
    }

    /// Sets the shutdown mode of the actor's pool.
    ///
    /// For a shared pool this affects every actor on it.
    pub fn set_shutdown_mode(&self, mode: ShutdownMode) {
        self.pool.set_shutdown_mode(mode);
    }

    /// Shuts down the actor's pool, see [`WorkerPool::shutdown`].
    ///
    /// For a shared pool this stops every actor on it.
    pub fn shutdown(&self) {
        self.pool.shutdown();
    }
}

impl fmt::Debug for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Actor")
            .field("id", &self.id)
            .field("isolated", &self.is_isolated())
            .field("pool", &self.pool)
            .finish()
    }
}
