//! A multi-producer, multi-consumer FIFO queue with optional capacity bound.
//!
//! [`BoundedChannel`] is the mailbox behind every [`WorkerPool`](crate::actor::pool::WorkerPool): producers
//! push tasks, worker threads pop them. A bounded channel applies backpressure by blocking pushers while it is
//! full, and every blocking operation has a timed variant which hands the value back instead of waiting forever.
//!
//! All state lives behind a single mutex, so pushes are totally ordered and poppers observe values in exactly
//! the order the pushes completed. Waiters are woken with `notify_all` and always re-check their condition
//! under the lock.

use std::{
    collections::VecDeque,
    fmt, mem,
    time::{Duration, Instant},
};

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::error::{PopTimeoutError, PushError, PushTimeoutError, TryPushError};

/// A thread-safe FIFO queue, bounded or unbounded.
///
/// # Example
///
/// ```
/// use courier::mailbox::BoundedChannel;
/// use std::time::Duration;
///
/// let channel = BoundedChannel::new(1);
/// channel.push("first").unwrap();
/// assert!(channel.push_timeout("second", Duration::from_millis(10)).is_err());
/// assert_eq!(channel.pop(), Some("first"));
/// ```
pub struct BoundedChannel<T> {
    state: Mutex<State<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: Option<usize>,
}

struct State<T> {
    queue: VecDeque<T>,
    closed: bool,
}

impl<T> BoundedChannel<T> {
    /// Creates a channel holding at most `capacity` values.
    ///
    /// A capacity of `0` creates an unbounded channel.
    pub fn new(capacity: usize) -> Self {
        BoundedChannel {
            state: Mutex::new(State {
                queue: VecDeque::new(),
                closed: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity: (capacity > 0).then_some(capacity),
        }
    }

    /// Creates a channel whose size is only limited by memory.
    pub fn unbounded() -> Self {
        BoundedChannel::new(0)
    }

    /// Returns the capacity of the channel, or `None` if it is unbounded.
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Appends a value, blocking while the channel is full.
    ///
    /// Fails only if the channel has been [closed](BoundedChannel::close), handing the value back.
    pub fn push(&self, value: T) -> Result<(), PushError<T>> {
        let mut state = self.state.lock();
        loop {
            if state.closed {
                return Err(PushError(value));
            }
            if !self.is_full(&state) {
                break;
            }
            self.not_full.wait(&mut state);
        }

        self.enqueue(state, value);
        Ok(())
    }

    /// Appends a value, blocking while the channel is full but no longer than `timeout`.
    ///
    /// On timeout the channel is left untouched and the value is handed back.
    pub fn push_timeout(&self, value: T, timeout: Duration) -> Result<(), PushTimeoutError<T>> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        loop {
            if state.closed {
                return Err(PushTimeoutError::Closed(value));
            }
            if !self.is_full(&state) {
                break;
            }
            if self.not_full.wait_until(&mut state, deadline).timed_out() {
                if state.closed {
                    return Err(PushTimeoutError::Closed(value));
                }
                if self.is_full(&state) {
                    return Err(PushTimeoutError::Timeout(value));
                }
                break;
            }
        }

        self.enqueue(state, value);
        Ok(())
    }

    /// Appends a value only if there is room right now.
    pub fn try_push(&self, value: T) -> Result<(), TryPushError<T>> {
        let state = self.state.lock();
        if state.closed {
            return Err(TryPushError::Closed(value));
        }
        if self.is_full(&state) {
            return Err(TryPushError::Full(value));
        }

        self.enqueue(state, value);
        Ok(())
    }

    /// Removes the front value, blocking while the channel is empty.
    ///
    /// Returns `None` once the channel is closed and every queued value has been taken.
    pub fn pop(&self) -> Option<T> {
        let mut state = self.state.lock();
        loop {
            if let Some(value) = self.dequeue(&mut state) {
                return Some(value);
            }
            if state.closed {
                return None;
            }
            self.not_empty.wait(&mut state);
        }
    }

    /// Removes the front value, blocking while the channel is empty but no longer than `timeout`.
    pub fn pop_timeout(&self, timeout: Duration) -> Result<T, PopTimeoutError> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        loop {
            if let Some(value) = self.dequeue(&mut state) {
                return Ok(value);
            }
            if state.closed {
                return Err(PopTimeoutError::Closed);
            }
            if self.not_empty.wait_until(&mut state, deadline).timed_out() {
                return self.dequeue(&mut state).ok_or(if state.closed {
                    PopTimeoutError::Closed
                } else {
                    PopTimeoutError::Timeout
                });
            }
        }
    }

    /// Removes the front value if there is one.
    pub fn try_pop(&self) -> Option<T> {
        let mut state = self.state.lock();
        self.dequeue(&mut state)
    }

    /// Returns the number of queued values.
    pub fn len(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Returns `true` if no values are queued.
    pub fn is_empty(&self) -> bool {
        self.state.lock().queue.is_empty()
    }

    /// Atomically discards every queued value, returning how many were dropped.
    ///
    /// Blocked pushers are woken since space became available. Blocked poppers keep waiting.
    /// The discarded values are dropped after the lock is released.
    pub fn clear(&self) -> usize {
        let discarded = {
            let mut state = self.state.lock();
            let discarded = mem::take(&mut state.queue);
            self.not_full.notify_all();
            discarded
        };
        discarded.len()
    }

    /// Closes the channel.
    ///
    /// Further pushes fail, while values already queued can still be popped. Every waiter is woken.
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    /// Returns `true` if the channel has been closed.
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Returns the number of queued values satisfying `predicate`.
    pub(crate) fn count_where(&self, predicate: impl Fn(&T) -> bool) -> usize {
        self.state
            .lock()
            .queue
            .iter()
            .filter(|value| predicate(value))
            .count()
    }

    /// Pushes regardless of closure and capacity.
    ///
    /// Used by the worker pool to deliver stop signals after refusing new work. A pool shut down from its only
    /// worker must not wait for room that worker would have to make. Values pushed this way may take
    /// [`len`](Self::len) past the capacity.
    pub(crate) fn force_push(&self, value: T) {
        let state = self.state.lock();
        self.enqueue(state, value);
    }

    #[inline]
    fn is_full(&self, state: &State<T>) -> bool {
        self.capacity
            .is_some_and(|capacity| state.queue.len() >= capacity)
    }

    #[inline]
    fn enqueue(&self, mut state: MutexGuard<'_, State<T>>, value: T) {
        state.queue.push_back(value);
        self.not_empty.notify_all();
    }

    #[inline]
    fn dequeue(&self, state: &mut State<T>) -> Option<T> {
        let value = state.queue.pop_front()?;
        self.not_full.notify_all();
        Some(value)
    }
}

impl<T> Default for BoundedChannel<T> {
    fn default() -> Self {
        BoundedChannel::unbounded()
    }
}

impl<T> fmt::Debug for BoundedChannel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("BoundedChannel")
            .field("len", &state.queue.len())
            .field("capacity", &self.capacity)
            .field("closed", &state.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
        thread,
        time::Duration,
    };

    use super::*;

    #[test]
    fn pops_in_push_order() {
        let channel = BoundedChannel::unbounded();
        for i in 0..100 {
            channel.push(i).unwrap();
        }
        let popped: Vec<_> = (0..100).map(|_| channel.pop().unwrap()).collect();
        assert_eq!(popped, (0..100).collect::<Vec<_>>());
        assert!(channel.is_empty());
    }

    #[test]
    fn push_blocks_at_capacity() {
        const CAPACITY: usize = 5;

        let channel = Arc::new(BoundedChannel::new(CAPACITY));
        let pushed = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..CAPACITY + 1)
            .map(|i| {
                let channel = channel.clone();
                let pushed = pushed.clone();
                thread::spawn(move || {
                    channel.push(i).unwrap();
                    pushed.fetch_add(1, Ordering::SeqCst);
                })
            })
            .collect();

        while pushed.load(Ordering::SeqCst) < CAPACITY {
            thread::yield_now();
        }
        thread::sleep(Duration::from_millis(50));
        assert_eq!(pushed.load(Ordering::SeqCst), CAPACITY);
        assert_eq!(channel.len(), CAPACITY);

        channel.pop().unwrap();
        channel.pop().unwrap();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(channel.len(), CAPACITY - 1);
    }

    #[test]
    fn pop_blocks_until_pushed() {
        let channel = Arc::new(BoundedChannel::unbounded());
        let producer = thread::spawn({
            let channel = channel.clone();
            move || {
                thread::sleep(Duration::from_millis(50));
                channel.push(String::from("element")).unwrap();
            }
        });

        assert_eq!(channel.pop().as_deref(), Some("element"));
        producer.join().unwrap();
    }

    #[test]
    fn timed_operations() {
        let channel = BoundedChannel::new(1);
        assert_eq!(channel.push_timeout(1, Duration::from_secs(10)), Ok(()));
        assert_eq!(
            channel.push_timeout(2, Duration::from_millis(10)),
            Err(PushTimeoutError::Timeout(2))
        );
        assert_eq!(channel.len(), 1);

        assert_eq!(channel.pop_timeout(Duration::from_secs(10)), Ok(1));
        assert_eq!(
            channel.pop_timeout(Duration::from_millis(10)),
            Err(PopTimeoutError::Timeout)
        );
    }

    #[test]
    fn try_operations() {
        let channel = BoundedChannel::new(1);
        assert_eq!(channel.try_pop(), None);
        assert_eq!(channel.try_push('a'), Ok(()));
        assert_eq!(channel.try_push('b'), Err(TryPushError::Full('b')));
        assert_eq!(channel.try_pop(), Some('a'));
    }

    #[test]
    fn clear_unblocks_pushers() {
        const CAPACITY: i32 = 100;

        let channel = Arc::new(BoundedChannel::new(CAPACITY as usize));
        for i in 0..CAPACITY {
            channel.push(i).unwrap();
        }

        let pusher = thread::spawn({
            let channel = channel.clone();
            move || channel.push(-1).unwrap()
        });

        thread::sleep(Duration::from_millis(50));
        assert_eq!(channel.clear(), CAPACITY as usize);
        pusher.join().unwrap();

        assert_eq!(channel.pop(), Some(-1));
        assert!(channel.is_empty());
    }

    #[test]
    fn closed_channel_drains_then_ends() {
        let channel = BoundedChannel::unbounded();
        channel.push(1).unwrap();
        channel.close();

        assert!(channel.is_closed());
        assert_eq!(channel.push(2), Err(PushError(2)));
        assert_eq!(channel.try_push(3), Err(TryPushError::Closed(3)));
        assert_eq!(channel.pop(), Some(1));
        assert_eq!(channel.pop(), None);
        assert_eq!(
            channel.pop_timeout(Duration::from_millis(10)),
            Err(PopTimeoutError::Closed)
        );
    }

    #[test]
    fn close_wakes_blocked_poppers() {
        let channel = Arc::new(BoundedChannel::<u8>::unbounded());
        let popper = thread::spawn({
            let channel = channel.clone();
            move || channel.pop()
        });

        thread::sleep(Duration::from_millis(20));
        channel.close();
        assert_eq!(popper.join().unwrap(), None);
    }

    #[test]
    fn never_exceeds_capacity() {
        const CAPACITY: usize = 3;

        let channel = Arc::new(BoundedChannel::new(CAPACITY));
        let producers: Vec<_> = (0..4)
            .map(|_| {
                let channel = channel.clone();
                thread::spawn(move || {
                    for i in 0..250 {
                        channel.push(i).unwrap();
                    }
                })
            })
            .collect();

        let mut popped = 0;
        while popped < 1000 {
            assert!(channel.len() <= CAPACITY);
            if channel.pop_timeout(Duration::from_secs(5)).is_ok() {
                popped += 1;
            }
        }
        for producer in producers {
            producer.join().unwrap();
        }
        assert!(channel.is_empty());
    }
}
