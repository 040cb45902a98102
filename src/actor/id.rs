use std::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
};

static ACTOR_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A process-wide unique identifier for an actor.
///
/// Identifiers are handed out sequentially: the first actor created gets id 0, the second 1, and so on.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ActorId {
    sequence_id: u64,
}

impl ActorId {
    /// Creates an `ActorId` with the given `sequence_id`.
    pub const fn new(sequence_id: u64) -> Self {
        ActorId { sequence_id }
    }

    /// Generates a new `ActorId` with an automatically incremented `sequence_id`.
    pub fn generate() -> Self {
        ActorId::new(ACTOR_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the sequential identifier of the actor.
    pub fn sequence_id(&self) -> u64 {
        self.sequence_id
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ActorId({})", self.sequence_id)
    }
}

impl fmt::Debug for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ActorId({:?})", self.sequence_id)
    }
}
