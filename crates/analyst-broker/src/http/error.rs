//! API errors mapped to HTTP status codes.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::{debug, info, warn};

use analyst_broker_core::CoreError;

use crate::broker::BrokerError;
use crate::http::responses::ErrorResponse;

/// Errors returned by HTTP handlers.
#[derive(Debug)]
pub enum ApiError {
    /// Request body was not valid JSON for the endpoint.
    InvalidJson { message: String },

    /// A path parameter or field failed validation.
    InvalidInput { message: String },

    /// The broker refused or could not find something.
    Broker(BrokerError),

    /// A single-point request was not answered in time.
    Timeout,
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidJson {
            message: rejection.body_text(),
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(e: CoreError) -> Self {
        Self::InvalidInput {
            message: e.to_string(),
        }
    }
}

impl From<BrokerError> for ApiError {
    fn from(e: BrokerError) -> Self {
        Self::Broker(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::InvalidJson { message } => {
                info!(error = %message, "Could not decode JSON payload");
                (
                    StatusCode::BAD_REQUEST,
                    format!("Could not decode JSON payload: {message}"),
                )
            }
            ApiError::InvalidInput { message } => (StatusCode::BAD_REQUEST, message),
            ApiError::Broker(e) => {
                let status = match &e {
                    BrokerError::Validation(_) => StatusCode::BAD_REQUEST,
                    BrokerError::QueueFull { .. } => {
                        warn!(error = %e, "Rejecting regional submission");
                        StatusCode::SERVICE_UNAVAILABLE
                    }
                    BrokerError::TaskNotFound(_) | BrokerError::JobNotFound(_) => {
                        debug!(error = %e, "Not found");
                        StatusCode::NOT_FOUND
                    }
                };
                (status, e.to_string())
            }
            ApiError::Timeout => (
                StatusCode::GATEWAY_TIMEOUT,
                "No worker answered in time".to_string(),
            ),
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}
