//! Job handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};

use analyst_broker_core::JobId;

use crate::http::error::ApiError;
use crate::http::responses::JobsResponse;
use crate::state::AppState;

/// Status of every job plus a summary across all of them.
pub async fn list_jobs(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (jobs, summary) = state.broker.job_statuses();
    Json(JobsResponse { jobs, summary })
}

/// Delete a job and everything it still has queued or in flight.
pub async fn delete_job(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.broker.delete_job(&JobId::new(job_id))?;
    Ok(Json(serde_json::json!({ "status": "job deleted" })))
}
