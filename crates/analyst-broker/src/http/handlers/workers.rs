//! Worker list handler.

use std::sync::Arc;

use axum::{extract::State, response::IntoResponse, Json};

use crate::state::AppState;

/// List every worker seen recently.
pub async fn list_workers(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.broker.workers())
}
