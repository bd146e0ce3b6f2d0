//! Analyst Broker Library
//!
//! This crate provides the broker that sits between analysis clients and
//! the worker fleet: per-category task queues, long-polling worker and
//! requester connections, redelivery of unacknowledged work, and the HTTP
//! surface over all of it.

pub mod broker;
pub mod config;
pub mod http;
pub mod metrics;
pub mod state;
pub mod sweeper;
pub mod transport;

pub use broker::{Broker, BrokerError};
pub use config::Config;
pub use state::AppState;
