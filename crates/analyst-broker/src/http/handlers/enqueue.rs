//! Task submission handlers.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use tracing::info;

use analyst_broker_core::TaskRequest;

use crate::http::error::ApiError;
use crate::http::guard::ProducerGuard;
use crate::http::responses::{EnqueueResponse, SubmittedTask};
use crate::state::AppState;
use crate::transport::ParkedResponse;

/// Enqueue a list of tasks that all belong to one job.
///
/// Returns as soon as the tasks are queued or dispatched.
pub async fn enqueue_regional(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Vec<SubmittedTask>>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(tasks) = payload?;
    let requests = tasks
        .into_iter()
        .map(SubmittedTask::into_request)
        .collect::<Result<Vec<TaskRequest>, _>>()?;

    let task_ids = state.broker.enqueue_regional_batch(requests)?;
    Ok((StatusCode::ACCEPTED, Json(EnqueueResponse { task_ids })))
}

/// Enqueue a single-point task and hold the connection open for its result.
pub async fn enqueue_single(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SubmittedTask>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(task) = payload?;
    let request = task.into_request()?;
    let category = request.category.clone();

    let (producer, suspended) = ParkedResponse::suspend();
    let task_id = state.broker.enqueue_priority(request, producer);
    let mut guard = ProducerGuard::new(state.clone(), task_id, suspended);

    match guard.wait(state.config.priority_timeout()).await {
        Some(result) => Ok((
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            result,
        )
            .into_response()),
        None => {
            info!(
                task_id = %task_id,
                category = %category,
                "Single-point task timed out waiting for a worker"
            );
            Err(ApiError::Timeout)
        }
    }
}
