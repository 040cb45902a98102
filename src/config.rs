//! Worker pool configuration.
//!
//! [`PoolConfig`] can be built in code with its setters, or deserialized with serde from any format:
//!
//! ```
//! use courier::config::{PoolConfig, ShutdownMode};
//!
//! let config = PoolConfig::default().threads(4).capacity(128).shutdown_mode(ShutdownMode::Immediate);
//! assert_eq!(config.threads.get(), 4);
//! ```

use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};

/// What happens to queued, not-yet-started tasks when a pool shuts down.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShutdownMode {
    /// Every task queued before shutdown runs to completion.
    #[default]
    Graceful,
    /// Queued tasks are discarded. Tasks already running finish.
    Immediate,
}

/// Configuration of a [`WorkerPool`](crate::actor::pool::WorkerPool).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of worker threads.
    pub threads: NonZeroUsize,
    /// Maximum number of queued tasks, `0` for unbounded.
    pub capacity: usize,
    /// Behaviour of queued tasks on shutdown.
    pub shutdown_mode: ShutdownMode,
}

impl PoolConfig {
    /// Sets the number of worker threads.
    ///
    /// A value of `0` is raised to one thread.
    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = NonZeroUsize::new(threads).unwrap_or(NonZeroUsize::MIN);
        self
    }

    /// Sets the queue capacity, `0` for unbounded.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the shutdown mode.
    pub fn shutdown_mode(mut self, shutdown_mode: ShutdownMode) -> Self {
        self.shutdown_mode = shutdown_mode;
        self
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            threads: NonZeroUsize::MIN,
            capacity: 0,
            shutdown_mode: ShutdownMode::default(),
        }
    }
}
