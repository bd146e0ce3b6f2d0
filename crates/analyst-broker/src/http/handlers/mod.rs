//! HTTP request handlers.

mod complete;
mod dequeue;
mod enqueue;
mod health;
mod jobs;
mod workers;

pub use complete::{acknowledge_task, complete_priority};
pub use dequeue::{dequeue_regional, dequeue_single, WORKER_ID_HEADER};
pub use enqueue::{enqueue_regional, enqueue_single};
pub use health::{health_check, metrics_handler};
pub use jobs::{delete_job, list_jobs};
pub use workers::list_workers;
