//! Shared application state.

use std::sync::Arc;

use crate::broker::Broker;
use crate::config::Config;

/// Shared application state.
pub struct AppState {
    /// Task queues, parked connections, and worker catalog.
    pub broker: Broker,

    /// Timeouts and limits.
    pub config: Config,
}

impl AppState {
    /// Create a new AppState wrapped in Arc.
    pub fn new(config: Config) -> Arc<Self> {
        Arc::new(Self {
            broker: Broker::new(config.queue_config()),
            config,
        })
    }
}

impl Default for AppState {
    fn default() -> Self {
        let config = Config::default();
        Self {
            broker: Broker::new(config.queue_config()),
            config,
        }
    }
}
