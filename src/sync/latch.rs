use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// A barrier released once it has been counted down to zero.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use courier::{actor::Actor, message::Envelope, sync::CountdownLatch};
///
/// let latch = Arc::new(CountdownLatch::new(3));
/// let actor = Actor::new({
///     let latch = latch.clone();
///     move |_: Envelope| latch.count_down()
/// });
///
/// for _ in 0..3 {
///     let _ = actor.send(Envelope::empty());
/// }
/// latch.wait();
/// assert_eq!(latch.count(), 0);
/// ```
#[derive(Debug)]
pub struct CountdownLatch {
    count: Mutex<usize>,
    released: Condvar,
}

impl CountdownLatch {
    /// Creates a latch which opens after `count` calls to [`count_down`](CountdownLatch::count_down).
    ///
    /// A latch created with a count of zero is already open.
    pub fn new(count: usize) -> Self {
        CountdownLatch {
            count: Mutex::new(count),
            released: Condvar::new(),
        }
    }

    /// Decrements the count, releasing every waiter when it reaches zero.
    ///
    /// Counting down an open latch has no effect.
    pub fn count_down(&self) {
        let mut count = self.count.lock();
        if *count == 0 {
            return;
        }
        *count -= 1;
        if *count == 0 {
            self.released.notify_all();
        }
    }

    /// Returns the remaining count.
    pub fn count(&self) -> usize {
        *self.count.lock()
    }

    /// Blocks until the count reaches zero.
    pub fn wait(&self) {
        let mut count = self.count.lock();
        while *count > 0 {
            self.released.wait(&mut count);
        }
    }

    /// Blocks until the count reaches zero or `timeout` elapses.
    ///
    /// Returns `true` if the latch opened.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut count = self.count.lock();
        while *count > 0 {
            if self.released.wait_until(&mut count, deadline).timed_out() {
                return *count == 0;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread};

    use super::*;

    #[test]
    fn releases_all_waiters() {
        let latch = Arc::new(CountdownLatch::new(2));
        let waiters: Vec<_> = (0..3)
            .map(|_| {
                let latch = latch.clone();
                thread::spawn(move || latch.wait())
            })
            .collect();

        latch.count_down();
        assert_eq!(latch.count(), 1);
        latch.count_down();
        for waiter in waiters {
            waiter.join().unwrap();
        }
    }

    #[test]
    fn saturates_at_zero() {
        let latch = CountdownLatch::new(1);
        latch.count_down();
        latch.count_down();
        assert_eq!(latch.count(), 0);
        latch.wait();
    }

    #[test]
    fn wait_timeout_reports_outcome() {
        let latch = CountdownLatch::new(1);
        assert!(!latch.wait_timeout(Duration::from_millis(10)));
        latch.count_down();
        assert!(latch.wait_timeout(Duration::from_millis(10)));
        assert!(CountdownLatch::new(0).wait_timeout(Duration::ZERO));
    }
}
