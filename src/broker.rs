//! Topic-based publish-subscribe routing.
//!
//! A [`Broker`] keeps, for every topic, the ordered list of actors subscribed to it. Publishing to a topic sends
//! every subscriber its own copy of the message. The same actor may subscribe to a topic more than once, and
//! then receives one copy per subscription.
//!
//! Topics use the same `/`-delimited names as registry addresses, so [`Broker::multicast`] can reach every topic
//! matching a wildcard [`Pattern`].
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use courier::{actor::Actor, broker::Broker, message::Envelope};
//!
//! let broker = Broker::new();
//! let logger = Arc::new(Actor::new(|msg: Envelope| msg.downcast::<String>().map(|line| line.len())));
//!
//! broker.subscribe("/logs/app", logger.clone());
//! broker.subscribe("/logs/db", logger);
//!
//! let handles = broker.multicast("/logs/+", Envelope::new(String::from("started")))?;
//! assert_eq!(handles.len(), 2);
//! for handle in handles {
//!     assert_eq!(handle.wait()?.downcast::<usize>()?, 7);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::{collections::BTreeMap, fmt, sync::Arc};

use parking_lot::Mutex;
use tracing::trace;

use crate::{
    actor::Actor,
    error::PatternError,
    message::Envelope,
    registry::send_all,
    reply::CompletionHandle,
    topic::Pattern,
};

/// A publish-subscribe broker routing messages to actors by topic.
#[derive(Default)]
pub struct Broker {
    topics: Mutex<BTreeMap<String, Vec<Arc<Actor>>>>,
}

impl Broker {
    /// Creates a broker with no topics.
    pub fn new() -> Self {
        Broker::default()
    }

    /// Subscribes an actor to `topic`, creating the topic if needed.
    pub fn subscribe(&self, topic: impl Into<String>, actor: Arc<Actor>) {
        let topic = topic.into();
        trace!(%topic, id = %actor.id(), "subscribing actor");
        self.topics.lock().entry(topic).or_default().push(actor);
    }

    /// Subscribes several actors to `topic`, in iteration order.
    ///
    /// No topic is created when `actors` is empty.
    pub fn subscribe_all<I>(&self, topic: impl Into<String>, actors: I)
    where
        I: IntoIterator<Item = Arc<Actor>>,
    {
        let actors: Vec<_> = actors.into_iter().collect();
        if actors.is_empty() {
            return;
        }

        let topic = topic.into();
        trace!(%topic, count = actors.len(), "subscribing actors");
        self.topics.lock().entry(topic).or_default().extend(actors);
    }

    /// Removes the first subscription of `actor` to `topic`, returning whether one existed.
    ///
    /// A topic left without subscribers is removed.
    pub fn unsubscribe(&self, topic: &str, actor: &Actor) -> bool {
        let removed = {
            let mut topics = self.topics.lock();
            let Some(subscribers) = topics.get_mut(topic) else {
                return false;
            };
            let removed = subscribers
                .iter()
                .position(|subscriber| subscriber.id() == actor.id())
                .map(|index| subscribers.remove(index));
            if subscribers.is_empty() {
                topics.remove(topic);
            }
            removed
        };

        removed.is_some()
    }

    /// Sends a copy of the message to every subscriber of exactly `topic`.
    ///
    /// Returns no handles if the topic has no subscribers.
    pub fn publish(&self, topic: &str, msg: Envelope) -> Vec<CompletionHandle> {
        let subscribers = self.subscribers(topic);
        trace!(%topic, subscribers = subscribers.len(), "publishing message");
        send_all(&subscribers, msg)
    }

    /// Sends a copy of the message to every subscription of every topic.
    ///
    /// An actor subscribed to several topics, or several times to one topic, receives one copy per subscription.
    pub fn broadcast(&self, msg: Envelope) -> Vec<CompletionHandle> {
        let subscribers: Vec<_> = self.topics.lock().values().flatten().cloned().collect();
        send_all(&subscribers, msg)
    }

    /// Sends a copy of the message to every subscription of every topic matching `pattern`.
    ///
    /// A malformed pattern is rejected before anything is sent.
    pub fn multicast(
        &self,
        pattern: &str,
        msg: Envelope,
    ) -> Result<Vec<CompletionHandle>, PatternError> {
        let pattern = Pattern::new(pattern)?;
        let subscribers: Vec<_> = self
            .topics
            .lock()
            .iter()
            .filter(|(topic, _)| pattern.matches(topic))
            .flat_map(|(_, subscribers)| subscribers.iter().cloned())
            .collect();

        trace!(%pattern, subscribers = subscribers.len(), "multicasting message");
        Ok(send_all(&subscribers, msg))
    }

    /// Returns every topic with at least one subscriber, in sorted order.
    pub fn topics(&self) -> Vec<String> {
        self.topics.lock().keys().cloned().collect()
    }

    /// Returns the subscribers of `topic`, in subscription order.
    pub fn subscribers(&self, topic: &str) -> Vec<Arc<Actor>> {
        self.topics
            .lock()
            .get(topic)
            .cloned()
            .unwrap_or_default()
    }
}

impl fmt::Debug for Broker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let topics = self.topics.lock();
        f.debug_map()
            .entries(
                topics
                    .iter()
                    .map(|(topic, subscribers)| (topic, subscribers.len())),
            )
            .finish()
    }
}
