#![allow(dead_code)]

use std::sync::Arc;

use courier::{Actor, Envelope};
use parking_lot::Mutex;
use tracing_subscriber::EnvFilter;

/// Installs a subscriber printing courier's events when `RUST_LOG` is set.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .without_time()
        .try_init();
}

/// Names of the actors which received a message, in handling order.
pub type Inbox = Arc<Mutex<Vec<String>>>;

/// An isolated actor recording `name` into `inbox` for every message, replying with the message itself.
pub fn recorder(name: &str, inbox: &Inbox) -> Arc<Actor> {
    let name = name.to_owned();
    let inbox = inbox.clone();
    Arc::new(Actor::new(move |msg: Envelope| {
        inbox.lock().push(name.clone());
        msg
    }))
}

/// Returns the recorded names in sorted order.
pub fn sorted(inbox: &Inbox) -> Vec<String> {
    let mut names = inbox.lock().clone();
    names.sort();
    names
}
