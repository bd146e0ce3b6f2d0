//! Task kinds and lifecycle states.

use serde::{Deserialize, Serialize};

/// Which class of request a task belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskKind {
    /// Single-point request; a client is waiting on the result.
    Priority,
    /// Part of a regional batch job; completion is only acknowledged.
    Regional,
}

/// Lifecycle of a task inside the broker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    /// Waiting in its category queue.
    #[default]
    Queued,
    /// Handed to a worker, not yet acknowledged or answered.
    ///
    /// Acknowledged, answered, and cancelled tasks leave the broker's task
    /// table instead of moving to a further state.
    InFlight,
}
