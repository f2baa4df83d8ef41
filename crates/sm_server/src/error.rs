//! Maps catalog/daemon errors onto the API's `{ok: false, message}` envelope.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use sm_protocol::errors::ErrorEnvelope;
use tracing::error;

pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        ApiError {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorEnvelope::new(self.message))).into_response()
    }
}

impl From<sm_db::DbError> for ApiError {
    fn from(e: sm_db::DbError) -> Self {
        error!(error = %e, "catalog error");
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
    }
}

impl From<sm_daemon::DaemonError> for ApiError {
    fn from(e: sm_daemon::DaemonError) -> Self {
        error!(error = %e, "daemon error");
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
    }
}
