//! A fixed-size pool of OS worker threads fed by a shared [`BoundedChannel`].
//!
//! Every worker loops popping signals from the pool's channel and running the tasks it receives, one at a time,
//! until it pops a stop signal. Tasks that panic are caught at the worker boundary and logged, so a misbehaving
//! task never takes a worker down with it.
//!
//! Shutting down a pool closes its channel to new work, optionally discards whatever is still queued (see
//! [`ShutdownMode`]), then sends exactly one stop signal per worker and joins every thread. Shutdown runs
//! automatically when the pool is dropped.
//!
//! # Example
//!
//! ```
//! use std::sync::{atomic::{AtomicUsize, Ordering}, Arc};
//! use courier::actor::pool::WorkerPool;
//!
//! let counter = Arc::new(AtomicUsize::new(0));
//! let pool = WorkerPool::new(4);
//! for _ in 0..100 {
//!     let counter = counter.clone();
//!     pool.dispatch(move || {
//!         counter.fetch_add(1, Ordering::Relaxed);
//!     })?;
//! }
//!
//! // Graceful shutdown drains the queue before joining
//! pool.shutdown();
//! assert_eq!(counter.load(Ordering::Relaxed), 100);
//! # Ok::<(), courier::error::DispatchError>(())
//! ```

use std::{
    fmt, mem,
    num::NonZeroUsize,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
    thread::{self, JoinHandle},
};

use parking_lot::Mutex;
use tracing::{debug, error, trace};

use crate::{
    config::{PoolConfig, ShutdownMode},
    error::{DispatchError, PanicError},
    mailbox::BoundedChannel,
};

/// A unit of work executed at most once by a worker thread.
pub struct Task(Box<dyn FnOnce() + Send + 'static>);

impl Task {
    /// Wraps a closure as a task.
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Task(Box::new(f))
    }

    fn run(self) {
        (self.0)()
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task").finish_non_exhaustive()
    }
}

/// What a worker receives from the pool's channel.
pub(crate) enum Signal {
    Work(Task),
    Stop,
}

/// A fixed number of worker threads executing tasks in FIFO order.
pub struct WorkerPool {
    channel: Arc<BoundedChannel<Signal>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    threads: NonZeroUsize,
    shutdown_mode: Mutex<ShutdownMode>,
}

impl WorkerPool {
    /// Creates a pool with `threads` workers and an unbounded queue.
    ///
    /// A value of `0` is raised to one thread.
    ///
    /// # Panics
    ///
    /// Panics if the OS fails to create a thread.
    pub fn new(threads: usize) -> Self {
        WorkerPool::with_config(PoolConfig::default().threads(threads))
    }

    /// Creates a pool from a [`PoolConfig`].
    ///
    /// # Panics
    ///
    /// Panics if the OS fails to create a thread.
    pub fn with_config(config: PoolConfig) -> Self {
        let channel = Arc::new(BoundedChannel::new(config.capacity));
        let workers = (0..config.threads.get())
            .map(|index| {
                let channel = channel.clone();
                thread::Builder::new()
                    .name(format!("courier-worker-{index}"))
                    .spawn(move || run_worker(index, &channel))
                    .unwrap_or_else(|err| panic!("failed to spawn worker thread: {err}"))
            })
            .collect();

        trace!(
            threads = config.threads.get(),
            capacity = config.capacity,
            "worker pool started"
        );

        WorkerPool {
            channel,
            workers: Mutex::new(workers),
            threads: config.threads,
            shutdown_mode: Mutex::new(config.shutdown_mode),
        }
    }

    /// Queues a closure for execution, blocking while the queue is at capacity.
    pub fn dispatch<F>(&self, f: F) -> Result<(), DispatchError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.dispatch_task(Task::new(f))
    }

    /// Queues a task for execution, blocking while the queue is at capacity.
    ///
    /// Fails once the pool has begun shutting down. The rejected task is dropped without running.
    pub fn dispatch_task(&self, task: Task) -> Result<(), DispatchError> {
        self.channel
            .push(Signal::Work(task))
            .map_err(|_| DispatchError::ShutDown)
    }

    /// Returns the shutdown mode applied when the pool shuts down.
    pub fn shutdown_mode(&self) -> ShutdownMode {
        *self.shutdown_mode.lock()
    }

    /// Sets the shutdown mode applied when the pool shuts down.
    pub fn set_shutdown_mode(&self, mode: ShutdownMode) {
        *self.shutdown_mode.lock() = mode;
    }

    /// Returns the number of worker threads.
    pub fn threads(&self) -> usize {
        self.threads.get()
    }

    /// Returns the number of queued tasks which have not started yet.
    ///
    /// Stop signals queued during shutdown are not counted.
    pub fn pending(&self) -> usize {
        self.channel
            .count_where(|signal| matches!(signal, Signal::Work(_)))
    }

    /// Returns `true` once shutdown has begun.
    pub fn is_shut_down(&self) -> bool {
        self.channel.is_closed()
    }

    /// Stops the pool and joins every worker thread.
    ///
    /// New dispatches are rejected from this point. In [`ShutdownMode::Graceful`] every queued task runs first,
    /// in [`ShutdownMode::Immediate`] queued tasks are dropped and their completion handles report
    /// [`TaskError::Discarded`](crate::error::TaskError::Discarded). Calling this more than once has no further
    /// effect.
    ///
    /// When called from one of the pool's own workers, that worker is not joined. It exits after its current
    /// task returns.
    pub fn shutdown(&self) {
        let workers = mem::take(&mut *self.workers.lock());
        if workers.is_empty() {
            return;
        }

        let mode = self.shutdown_mode();
        debug!(threads = workers.len(), ?mode, "shutting down worker pool");

        self.channel.close();
        if mode == ShutdownMode::Immediate {
            let discarded = self.channel.clear();
            debug!(discarded, "discarded queued tasks");
        }
        for _ in 0..workers.len() {
            self.channel.force_push(Signal::Stop);
        }

        let current = thread::current().id();
        for worker in workers {
            if worker.thread().id() == current {
                continue;
            }
            if worker.join().is_err() {
                error!("worker thread panicked outside of a task");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("threads", &self.threads)
            .field("pending", &self.pending())
            .field("shutdown_mode", &self.shutdown_mode())
            .finish()
    }
}

fn run_worker(index: usize, channel: &BoundedChannel<Signal>) {
    trace!(worker = index, "worker started");

    while let Some(Signal::Work(task)) = channel.pop() {
        if let Err(err) = panic::catch_unwind(AssertUnwindSafe(|| task.run())) {
            let err = PanicError::new_boxed(err);
            error!(worker = index, %err, "task panicked");
        }
    }

    trace!(worker = index, "worker stopped");
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            mpsc, Barrier,
        },
        time::Duration,
    };

    use super::*;

    #[test]
    fn graceful_shutdown_runs_every_task() {
        let counter = Arc::new(AtomicUsize::new(0));
        let pool = WorkerPool::new(2);
        for _ in 0..500 {
            let counter = counter.clone();
            pool.dispatch(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }

        pool.shutdown();
        assert_eq!(counter.load(Ordering::SeqCst), 500);
        assert!(pool.is_shut_down());
    }

    #[test]
    fn immediate_shutdown_discards_queued_tasks() {
        let counter = Arc::new(AtomicUsize::new(0));
        let pool = WorkerPool::with_config(
            PoolConfig::default().shutdown_mode(ShutdownMode::Immediate),
        );
        for _ in 0..1_000 {
            let counter = counter.clone();
            pool.dispatch(move || {
                thread::sleep(Duration::from_micros(100));
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }

        pool.shutdown();
        let ran = counter.load(Ordering::SeqCst);
        assert!(ran < 1_000, "ran {ran} tasks");
        assert_eq!(pool.pending(), 0);
    }

    #[test]
    fn dispatch_after_shutdown_is_rejected() {
        let pool = WorkerPool::new(1);
        pool.shutdown();
        pool.shutdown();
        assert_eq!(pool.dispatch(|| {}), Err(DispatchError::ShutDown));
    }

    #[test]
    fn panicking_task_keeps_worker_alive() {
        let pool = WorkerPool::new(1);
        pool.dispatch(|| panic!("task failure")).unwrap();

        let (tx, rx) = mpsc::channel();
        pool.dispatch(move || tx.send(thread::current().name().map(str::to_owned)).unwrap())
            .unwrap();
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(5)).unwrap().as_deref(),
            Some("courier-worker-0")
        );
    }

    #[test]
    fn workers_run_in_parallel() {
        const THREADS: usize = 4;

        let pool = WorkerPool::new(THREADS);
        assert_eq!(pool.threads(), THREADS);

        let barrier = Arc::new(Barrier::new(THREADS));
        let (tx, rx) = mpsc::channel();
        for _ in 0..THREADS {
            let barrier = barrier.clone();
            let tx = tx.clone();
            pool.dispatch(move || {
                barrier.wait();
                tx.send(()).unwrap();
            })
            .unwrap();
        }

        for _ in 0..THREADS {
            rx.recv_timeout(Duration::from_secs(5)).unwrap();
        }
    }

    #[test]
    fn bounded_queue_applies_backpressure() {
        let pool = Arc::new(WorkerPool::with_config(PoolConfig::default().capacity(1)));
        let (gate_tx, gate_rx) = mpsc::channel::<()>();
        pool.dispatch(move || gate_rx.recv().unwrap()).unwrap();

        // Wait for the worker to take the gated task, leaving room for exactly one more
        while pool.pending() > 0 {
            thread::yield_now();
        }
        pool.dispatch(|| {}).unwrap();

        let dispatched = Arc::new(AtomicUsize::new(0));
        let blocked = thread::spawn({
            let pool = pool.clone();
            let dispatched = dispatched.clone();
            move || {
                pool.dispatch(|| {}).unwrap();
                dispatched.fetch_add(1, Ordering::SeqCst);
            }
        });

        thread::sleep(Duration::from_millis(50));
        assert_eq!(dispatched.load(Ordering::SeqCst), 0);

        gate_tx.send(()).unwrap();
        blocked.join().unwrap();
        assert_eq!(dispatched.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn pending_ignores_stop_signals() {
        let pool = Arc::new(WorkerPool::with_config(PoolConfig::default().capacity(1)));
        let (gate_tx, gate_rx) = mpsc::channel::<()>();
        pool.dispatch(move || gate_rx.recv().unwrap()).unwrap();
        while pool.pending() > 0 {
            thread::yield_now();
        }
        pool.dispatch(|| {}).unwrap();

        let stopping = thread::spawn({
            let pool = pool.clone();
            move || pool.shutdown()
        });

        // The stop signal lands behind the queued task, past the capacity of one
        while pool.channel.len() < 2 {
            thread::yield_now();
        }
        assert_eq!(pool.pending(), 1);

        gate_tx.send(()).unwrap();
        stopping.join().unwrap();
        assert_eq!(pool.pending(), 0);
        assert!(pool.channel.is_empty());
    }

    #[test]
    fn dropping_pool_from_own_worker() {
        let pool = Arc::new(WorkerPool::new(1));
        let (go_tx, go_rx) = mpsc::channel::<()>();
        let (done_tx, done_rx) = mpsc::channel();

        let last_ref = pool.clone();
        pool.dispatch(move || {
            go_rx.recv().unwrap();
            drop(last_ref);
            done_tx.send(()).unwrap();
        })
        .unwrap();

        drop(pool);
        go_tx.send(()).unwrap();
        done_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    }
}
