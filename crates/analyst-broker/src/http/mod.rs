//! HTTP server for the broker.
//!
//! Provides endpoints for:
//! - Task submission (`/enqueue/{regional,single}`)
//! - Worker polling (`/dequeue/{regional,single}/:graph_id/:worker_version`)
//! - Completion (`/complete/priority/:task_id`, `DELETE /tasks/:task_id`)
//! - Jobs (`/jobs`, `DELETE /jobs/:job_id`)
//! - Worker list (`/workers`)
//! - Health check (`/health`)
//! - Prometheus metrics (`/metrics`)

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub mod error;
pub mod guard;
mod handlers;
pub mod responses;

pub use handlers::WORKER_ID_HEADER;

/// Regional batches can carry many thousands of tasks.
const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

/// Create the HTTP router.
pub fn create_router(state: Arc<AppState>) -> Router {
    // CORS layer for browser dashboards
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Producer routes
        .route("/enqueue/regional", post(handlers::enqueue_regional))
        .route("/enqueue/single", post(handlers::enqueue_single))
        // Worker routes
        .route(
            "/dequeue/regional/:graph_id/:worker_version",
            post(handlers::dequeue_regional),
        )
        .route(
            "/dequeue/single/:graph_id/:worker_version",
            post(handlers::dequeue_single),
        )
        .route("/complete/priority/:task_id", post(handlers::complete_priority))
        .route("/tasks/:task_id", delete(handlers::acknowledge_task))
        // Job routes
        .route("/jobs", get(handlers::list_jobs))
        .route("/jobs/:job_id", delete(handlers::delete_job))
        // Observability routes
        .route("/workers", get(handlers::list_workers))
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics_handler))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
