//! Mapping of run failures onto HTTP responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::error;

use blockrun_engine::RunError;
use blockrun_store::StoreError;

/// A [`RunError`] on its way out of a handler.
///
/// Backend rejections carry the backend's status and its error object as
/// `{"error": ...}`. Every other failure is a bare status with an empty body.
#[derive(Debug)]
pub struct ApiError(pub RunError);

impl From<RunError> for ApiError {
    fn from(error: RunError) -> Self {
        Self(error)
    }
}

impl From<StoreError> for ApiError {
    fn from(error: StoreError) -> Self {
        Self(RunError::Store(error))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self.0 {
            RunError::BackendRejected { status, error } => {
                let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                (status, Json(json!({ "error": error }))).into_response()
            }
            other => {
                let status = StatusCode::from_u16(other.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                if status.is_server_error() {
                    error!(target: "blockrun::server", code = other.code(), error = %other, "request failed");
                }
                status.into_response()
            }
        }
    }
}
