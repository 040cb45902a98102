//! Address-based routing of messages to registered actors.
//!
//! An [`ActorSystem`] maps address strings to actors. Messages can be sent to one exact address, broadcast to
//! every registered actor, or multicast to every address matching a wildcard [`Pattern`].
//!
//! The registry is a plain value: create one and share it (typically behind an [`Arc`]) with whatever needs to
//! route messages. Lookups copy the matching actors out under the lock and deliver after releasing it, so a
//! handler may itself use the registry.
//!
//! ```
//! use std::sync::Arc;
//! use courier::{actor::Actor, message::Envelope, registry::ActorSystem};
//!
//! let system = ActorSystem::new();
//! system.register("/greeter", Arc::new(Actor::new(|_| "hello")))?;
//!
//! let reply = system.send("/greeter", Envelope::empty()).unwrap().wait()?;
//! assert_eq!(reply.downcast::<&str>()?, "hello");
//! assert!(system.send("/nobody", Envelope::empty()).is_none());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::{collections::BTreeMap, fmt, sync::Arc};

use itertools::repeat_n;
use parking_lot::Mutex;
use tracing::trace;

use crate::{
    actor::Actor,
    error::{PatternError, RegistryError},
    message::Envelope,
    reply::CompletionHandle,
    topic::Pattern,
};

/// A registry of actors by address.
#[derive(Default)]
pub struct ActorSystem {
    actors: Mutex<BTreeMap<String, Arc<Actor>>>,
}

impl ActorSystem {
    /// Creates an empty registry.
    pub fn new() -> Self {
        ActorSystem::default()
    }

    /// Registers an actor under `address`, replacing and returning any actor previously registered there.
    ///
    /// The replaced actor is not shut down. It stops once the last reference to it is dropped.
    pub fn register(
        &self,
        address: impl Into<String>,
        actor: Arc<Actor>,
    ) -> Result<Option<Arc<Actor>>, RegistryError> {
        let address = address.into();
        if address.is_empty() {
            return Err(RegistryError::EmptyAddress);
        }

        trace!(%address, id = %actor.id(), "registering actor");
        Ok(self.actors.lock().insert(address, actor))
    }

    /// Removes the actor registered under `address`, returning whether there was one.
    ///
    /// Messages already sent to the actor are still handled.
    pub fn unregister(&self, address: &str) -> bool {
        let removed = self.actors.lock().remove(address);
        removed.is_some()
    }

    /// Returns the actor registered under `address`.
    pub fn get(&self, address: &str) -> Option<Arc<Actor>> {
        self.actors.lock().get(address).cloned()
    }

    /// Sends a message to the actor registered under exactly `address`.
    ///
    /// Returns `None` if no actor is registered there.
    pub fn send(&self, address: &str, msg: Envelope) -> Option<CompletionHandle> {
        let Some(actor) = self.get(address) else {
            trace!(%address, "no actor registered at address");
            return None;
        };
        Some(actor.send(msg))
    }

    /// Sends a copy of the message to every registered actor.
    pub fn broadcast(&self, msg: Envelope) -> Vec<CompletionHandle> {
        let actors: Vec<_> = self.actors.lock().values().cloned().collect();
        send_all(&actors, msg)
    }

    /// Sends a copy of the message to every actor whose address matches `pattern`.
    ///
    /// See [`Pattern`] for the wildcard syntax. A malformed pattern is rejected before anything is sent.
    pub fn multicast(
        &self,
        pattern: &str,
        msg: Envelope,
    ) -> Result<Vec<CompletionHandle>, PatternError> {
        let pattern = Pattern::new(pattern)?;
        let actors: Vec<_> = self
            .actors
            .lock()
            .iter()
            .filter(|(address, _)| pattern.matches(address))
            .map(|(_, actor)| actor.clone())
            .collect();

        trace!(%pattern, matched = actors.len(), "multicasting message");
        Ok(send_all(&actors, msg))
    }

    /// Returns every registered address, in sorted order.
    pub fn addresses(&self) -> Vec<String> {
        self.actors.lock().keys().cloned().collect()
    }

    /// Returns the number of registered actors.
    pub fn len(&self) -> usize {
        self.actors.lock().len()
    }

    /// Returns `true` if no actors are registered.
    pub fn is_empty(&self) -> bool {
        self.actors.lock().is_empty()
    }
}

impl fmt::Debug for ActorSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorSystem")
            .field("addresses", &self.addresses())
            .finish()
    }
}

/// Sends one copy of `msg` to each actor, in order.
pub(crate) fn send_all(actors: &[Arc<Actor>], msg: Envelope) -> Vec<CompletionHandle> {
    actors
        .iter()
        .zip(repeat_n(msg, actors.len())) // Avoids unnecessary clone of msg on last iteration
        .map(|(actor, msg)| actor.send(msg))
        .collect()
}
