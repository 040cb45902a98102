#![doc = include_str!("../README.md")]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(rust_2018_idioms)]
#![warn(missing_debug_implementations)]
#![deny(unused_must_use)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod actor;
pub mod broker;
pub mod config;
pub mod error;
pub mod mailbox;
pub mod message;
pub mod registry;
pub mod reply;
pub mod scheduler;
pub mod sync;
pub mod topic;

pub use actor::Actor;
pub use broker::Broker;
pub use message::Envelope;
pub use registry::ActorSystem;
pub use reply::{CompletionHandle, Reply};
