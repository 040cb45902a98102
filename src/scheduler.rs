//! Runs closures at scheduled instants, once or at a fixed rate.
//!
//! A [`Scheduler`] owns a single timer thread which sleeps until the earliest deadline, runs that task, and
//! goes back to sleep. Tasks run on the timer thread itself, so they should be short: hand longer work to an
//! [`Actor`](crate::actor::Actor) or [`WorkerPool`](crate::actor::pool::WorkerPool) from inside the task.
//!
//! # Example
//!
//! ```
//! use std::{sync::Arc, time::Duration};
//! use courier::{scheduler::Scheduler, sync::CountdownLatch};
//!
//! let scheduler = Scheduler::new();
//! let latch = Arc::new(CountdownLatch::new(3));
//!
//! let ticks = scheduler.schedule_every(Duration::from_millis(5), {
//!     let latch = latch.clone();
//!     move || latch.count_down()
//! });
//!
//! assert!(latch.wait_timeout(Duration::from_secs(5)));
//! ticks.cancel();
//! ```

use std::{
    cmp::Ordering,
    collections::BinaryHeap,
    fmt, mem,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{self, AtomicBool},
        Arc,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::{error, trace};

use crate::error::PanicError;

type Job = Box<dyn FnMut() + Send + 'static>;

/// A timer thread running scheduled closures.
///
/// Dropping the scheduler discards every pending task and joins the timer thread. A task which is running at
/// that moment finishes first.
pub struct Scheduler {
    shared: Arc<Shared>,
    thread: Option<JoinHandle<()>>,
}

struct Shared {
    state: Mutex<State>,
    wakeup: Condvar,
}

struct State {
    queue: BinaryHeap<Entry>,
    next_seq: u64,
    stopped: bool,
}

struct Entry {
    deadline: Instant,
    seq: u64,
    period: Option<Duration>,
    cancelled: Arc<AtomicBool>,
    job: Job,
}

impl Entry {
    fn is_cancelled(&self) -> bool {
        self.cancelled.load(atomic::Ordering::Acquire)
    }
}

// Reversed so the `BinaryHeap` pops the earliest deadline first, ties broken by scheduling order.
impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        (other.deadline, other.seq).cmp(&(self.deadline, self.seq))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Entry {}

/// A handle to a scheduled task, used to cancel it.
///
/// Dropping the handle does not cancel the task.
#[derive(Clone, Debug)]
pub struct TaskHandle {
    cancelled: Arc<AtomicBool>,
}

impl TaskHandle {
    /// Prevents any future run of the task.
    ///
    /// A run already in progress is not interrupted.
    pub fn cancel(&self) {
        self.cancelled.store(true, atomic::Ordering::Release);
    }

    /// Returns `true` if the task has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(atomic::Ordering::Acquire)
    }
}

impl Scheduler {
    /// Starts a scheduler with its timer thread.
    ///
    /// # Panics
    ///
    /// Panics if the OS fails to create a thread.
    pub fn new() -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                queue: BinaryHeap::new(),
                next_seq: 0,
                stopped: false,
            }),
            wakeup: Condvar::new(),
        });
        let thread = thread::Builder::new()
            .name("courier-scheduler".to_string())
            .spawn({
                let shared = shared.clone();
                move || run_timer(&shared)
            })
            .unwrap_or_else(|err| panic!("failed to spawn scheduler thread: {err}"));

        Scheduler {
            shared,
            thread: Some(thread),
        }
    }

    /// Runs `f` once at `deadline`, or as soon as possible if the deadline has passed.
    pub fn schedule_at<F>(&self, deadline: Instant, f: F) -> TaskHandle
    where
        F: FnOnce() + Send + 'static,
    {
        let mut f = Some(f);
        self.insert(
            deadline,
            None,
            Box::new(move || {
                if let Some(f) = f.take() {
                    f()
                }
            }),
        )
    }

    /// Runs `f` once after `delay`.
    pub fn schedule_after<F>(&self, delay: Duration, f: F) -> TaskHandle
    where
        F: FnOnce() + Send + 'static,
    {
        self.schedule_at(Instant::now() + delay, f)
    }

    /// Runs `f` at `first`, then every `period` after that until cancelled.
    ///
    /// Deadlines advance by exactly `period` from the previous deadline, not from when the previous run finished.
    ///
    /// # Panics
    ///
    /// Panics if `period` is zero.
    pub fn schedule_at_fixed_rate<F>(&self, first: Instant, period: Duration, f: F) -> TaskHandle
    where
        F: FnMut() + Send + 'static,
    {
        assert!(!period.is_zero(), "`period` must be non-zero.");
        self.insert(first, Some(period), Box::new(f))
    }

    /// Runs `f` every `period`, starting one period from now.
    ///
    /// # Panics
    ///
    /// Panics if `period` is zero.
    pub fn schedule_every<F>(&self, period: Duration, f: F) -> TaskHandle
    where
        F: FnMut() + Send + 'static,
    {
        self.schedule_at_fixed_rate(Instant::now() + period, period, f)
    }

    /// Returns the number of tasks waiting for their next deadline, including cancelled ones not yet reaped.
    pub fn pending(&self) -> usize {
        self.shared.state.lock().queue.len()
    }

    fn insert(&self, deadline: Instant, period: Option<Duration>, job: Job) -> TaskHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        let mut state = self.shared.state.lock();
        let seq = state.next_seq;
        state.next_seq += 1;
        state.queue.push(Entry {
            deadline,
            seq,
            period,
            cancelled: cancelled.clone(),
            job,
        });
        self.shared.wakeup.notify_all();

        TaskHandle { cancelled }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Scheduler::new()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        let discarded = {
            let mut state = self.shared.state.lock();
            state.stopped = true;
            self.shared.wakeup.notify_all();
            mem::take(&mut state.queue)
        };
        trace!(discarded = discarded.len(), "stopping scheduler");
        drop(discarded);

        if let Some(thread) = self.thread.take() {
            if thread.thread().id() != thread::current().id() && thread.join().is_err() {
                error!("scheduler thread panicked outside of a task");
            }
        }
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("pending", &self.pending())
            .finish()
    }
}

fn run_timer(shared: &Shared) {
    let mut state = shared.state.lock();
    loop {
        if state.stopped {
            return;
        }

        let Some(next) = state.queue.peek() else {
            shared.wakeup.wait(&mut state);
            continue;
        };
        if next.is_cancelled() {
            state.queue.pop();
            continue;
        }
        let deadline = next.deadline;
        if deadline > Instant::now() {
            shared.wakeup.wait_until(&mut state, deadline);
            continue;
        }

        let Some(mut entry) = state.queue.pop() else {
            continue;
        };
        let res = MutexGuard::unlocked(&mut state, || {
            panic::catch_unwind(AssertUnwindSafe(|| (entry.job)()))
        });

        match (res, entry.period) {
            (Err(err), _) => {
                let err = PanicError::new_boxed(err);
                error!(%err, "scheduled task panicked and will not run again");
            }
            (Ok(()), Some(period)) if !entry.is_cancelled() && !state.stopped => {
                entry.deadline += period;
                entry.seq = state.next_seq;
                state.next_seq += 1;
                state.queue.push(entry);
            }
            (Ok(()), _) => {}
        }
    }
}
