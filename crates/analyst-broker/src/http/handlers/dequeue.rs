//! Worker polling handlers.
//!
//! Workers supply their graph and worker version so they only ever receive
//! work of their own category. These are POSTs because they modify the
//! queues.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use analyst_broker_core::{Task, WorkerCategory, WorkerId};

use crate::broker::{PollKind, PollOutcome};
use crate::http::error::ApiError;
use crate::http::guard::PollGuard;
use crate::http::responses::DeliveredTask;
use crate::state::AppState;
use crate::transport::ParkedResponse;

/// Optional header carrying the polling worker's identity.
pub const WORKER_ID_HEADER: &str = "x-worker-id";

/// Poll for regional batch tasks.
pub async fn dequeue_regional(
    State(state): State<Arc<AppState>>,
    Path((graph_id, worker_version)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    dequeue(state, PollKind::Regional, graph_id, worker_version, &headers).await
}

/// Poll for single-point tasks.
pub async fn dequeue_single(
    State(state): State<Arc<AppState>>,
    Path((graph_id, worker_version)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    dequeue(state, PollKind::Priority, graph_id, worker_version, &headers).await
}

async fn dequeue(
    state: Arc<AppState>,
    kind: PollKind,
    graph_id: String,
    worker_version: String,
    headers: &HeaderMap,
) -> Result<Response, ApiError> {
    let category = WorkerCategory::new(graph_id, worker_version)?;
    if let Some(worker_id) = worker_id(headers) {
        state.broker.record_observation(worker_id, category.clone());
    }

    let (handle, suspended) = ParkedResponse::suspend();
    let outcome = match kind {
        PollKind::Regional => state.broker.poll_regional(&category, handle),
        PollKind::Priority => state.broker.poll_priority(&category, handle),
    };
    if let PollOutcome::Dispatched(tasks) = outcome {
        return Ok(tasks_response(&tasks));
    }

    let mut guard = PollGuard::new(state.clone(), kind, category, suspended);
    Ok(match guard.wait(state.config.poll_timeout()).await {
        Some(tasks) => tasks_response(&tasks),
        None => StatusCode::NO_CONTENT.into_response(),
    })
}

fn worker_id(headers: &HeaderMap) -> Option<WorkerId> {
    headers
        .get(WORKER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(WorkerId::from)
}

fn tasks_response(tasks: &[Task]) -> Response {
    let body: Vec<DeliveredTask<'_>> = tasks.iter().map(DeliveredTask::from).collect();
    Json(body).into_response()
}
