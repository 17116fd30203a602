// HTTP error mapping
// Decision: Handlers return core errors and let this module pick the status code
// Decision: Store and internal failures are logged and answered with a generic message

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use crmflow_core::{Error, ErrorKind};
use serde::Serialize;

/// Error body returned by every endpoint: `{"error": "..."}`
#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    pub error: String,
    #[serde(skip)]
    pub status: StatusCode,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            status,
        }
    }

    pub fn unauthorized(message: &str) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err.kind() {
            ErrorKind::Unauthorized => Self::new(StatusCode::UNAUTHORIZED, err.to_string()),
            ErrorKind::Forbidden => Self::new(StatusCode::FORBIDDEN, err.to_string()),
            ErrorKind::NotFound => Self::new(StatusCode::NOT_FOUND, err.to_string()),
            ErrorKind::BusinessRule => Self::bad_request(err.to_string()),
            // Delivery failures are recorded on executions and recipients
            ErrorKind::Channel | ErrorKind::Internal => {
                tracing::error!(error = %err, "Request failed");
                Self::internal()
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
