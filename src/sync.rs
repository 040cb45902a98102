//! Blocking synchronization helpers for coordinating threads around actors.
//!
//! - [`CountdownLatch`] lets threads wait until a number of events have happened.
//! - [`Rendezvous`] hands single values from one thread to another with no buffering.
//! - [`Continuation`] chains functions into a pipeline which can run on any thread.

mod continuation;
mod latch;
mod rendezvous;

pub use continuation::Continuation;
pub use latch::CountdownLatch;
pub use rendezvous::Rendezvous;
