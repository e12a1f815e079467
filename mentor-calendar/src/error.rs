use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::services::calendar::CalendarError;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Calendar not connected: {0}")]
    Unauthorized(String),

    #[error("Missing OAuth configuration: {}", .0.join(", "))]
    MissingConfiguration(Vec<&'static str>),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Calendar provider error: {0}")]
    Provider(String),

    #[error("Calendar provider unavailable: {0}")]
    Unavailable(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let (status, body) = match self {
            ServerError::MissingConfiguration(missing) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({
                    "error": "configuration_error",
                    "details": message,
                    "missing": missing,
                }),
            ),
            ServerError::BadRequest(details) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "bad_request", "details": details }),
            ),
            ServerError::Unauthorized(details) => (
                StatusCode::UNAUTHORIZED,
                json!({ "error": "needs_authorization", "details": details }),
            ),
            ServerError::Configuration(details) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "configuration_error", "details": details }),
            ),
            ServerError::Provider(details) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "provider_rejected", "details": details }),
            ),
            ServerError::Unavailable(details) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "provider_unavailable", "details": details, "retryable": true }),
            ),
            ServerError::Internal(details) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "internal_error", "details": details }),
            ),
        };

        (status, Json(body)).into_response()
    }
}

impl From<CalendarError> for ServerError {
    fn from(err: CalendarError) -> Self {
        match err {
            CalendarError::Unauthorized(details) => ServerError::Unauthorized(details),
            CalendarError::ProviderRejected(details) => ServerError::Provider(details),
            CalendarError::Transient(details) => ServerError::Unavailable(details),
        }
    }
}
