//! Analyst Broker Core Domain Types
//!
//! This crate contains pure domain types with no dependencies on:
//! - Network/HTTP
//! - Async runtime
//! - Connection handling
//!
//! All types here describe the work that flows through the broker: routing
//! categories, tasks, jobs, and worker observations.

pub mod category;
pub mod error;
pub mod ids;
pub mod job;
pub mod status;
pub mod task;
pub mod worker;

// Re-export commonly used types
pub use category::WorkerCategory;
pub use error::CoreError;
pub use ids::{JobId, TaskId, WorkerId};
pub use job::{Job, JobStatus, JobSummary};
pub use status::{TaskKind, TaskState};
pub use task::{Payload, Task, TaskRequest};
pub use worker::WorkerObservation;
