use std::fmt;

use parking_lot::{Condvar, Mutex};

/// An unbuffered channel where every send waits for a matching receive.
///
/// Only one value is offered at a time. Concurrent senders queue up for the slot, and each returns once its own
/// value has been received.
///
/// # Example
///
/// ```
/// use std::{sync::Arc, thread};
/// use courier::sync::Rendezvous;
///
/// let chan = Arc::new(Rendezvous::new());
/// let sender = thread::spawn({
///     let chan = chan.clone();
///     move || (0..3).for_each(|i| chan.send(i))
/// });
///
/// let received: Vec<i32> = (0..3).map(|_| chan.recv()).collect();
/// assert_eq!(received, [0, 1, 2]);
/// sender.join().unwrap();
/// ```
pub struct Rendezvous<T> {
    state: Mutex<State<T>>,
    changed: Condvar,
}

struct State<T> {
    slot: Option<T>,
    offered: u64,
    taken: u64,
}

impl<T> Rendezvous<T> {
    /// Creates an empty rendezvous channel.
    pub fn new() -> Self {
        Rendezvous {
            state: Mutex::new(State {
                slot: None,
                offered: 0,
                taken: 0,
            }),
            changed: Condvar::new(),
        }
    }

    /// Offers a value, blocking until a receiver has taken it.
    pub fn send(&self, value: T) {
        let mut state = self.state.lock();
        while state.slot.is_some() {
            self.changed.wait(&mut state);
        }

        state.slot = Some(value);
        state.offered += 1;
        let ticket = state.offered;
        self.changed.notify_all();

        while state.taken < ticket {
            self.changed.wait(&mut state);
        }
    }

    /// Blocks until a sender offers a value, and takes it.
    pub fn recv(&self) -> T {
        let mut state = self.state.lock();
        loop {
            if let Some(value) = state.slot.take() {
                state.taken += 1;
                self.changed.notify_all();
                return value;
            }
            self.changed.wait(&mut state);
        }
    }
}

impl<T> Default for Rendezvous<T> {
    fn default() -> Self {
        Rendezvous::new()
    }
}

impl<T> fmt::Debug for Rendezvous<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Rendezvous")
            .field("offered", &state.offered)
            .field("taken", &state.taken)
            .finish()
    }
}
