//! Completion handlers.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::debug;

use analyst_broker_core::TaskId;

use crate::broker::ResultDelivery;
use crate::http::error::ApiError;
use crate::state::AppState;

/// Record a single-point result and copy it back to the requester.
///
/// Delivery is best effort: if the requester already left, the worker still
/// gets a 200.
pub async fn complete_priority(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let task_id: TaskId = task_id.parse()?;

    if state.broker.complete_priority(task_id, body)? == ResultDelivery::ProducerGone {
        debug!(task_id = %task_id, "Result arrived after requester left");
    }
    Ok(StatusCode::OK)
}

/// Acknowledge a regional task so it is not delivered again.
pub async fn acknowledge_task(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let task_id: TaskId = task_id.parse()?;
    state.broker.acknowledge_regional(task_id)?;
    Ok(StatusCode::OK)
}
