use crate::domain::error::JobError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

/// A [`JobError`] rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub JobError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            JobError::MissingInput(_) => StatusCode::BAD_REQUEST,
            JobError::UnknownJob(_) => StatusCode::NOT_FOUND,
            JobError::DuplicateJob(_)
            | JobError::NotFinished(_)
            | JobError::OutputConflict { .. } => StatusCode::CONFLICT,
            JobError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            JobError::Aborted
            | JobError::ProcessLaunch { .. }
            | JobError::ScriptRuntime(_)
            | JobError::Conversion(_)
            | JobError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JobError> for ApiError {
    fn from(err: JobError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{}", self.0);
        }
        let body = serde_json::json!({ "error": self.0.to_string() });
        (status, Json(body)).into_response()
    }
}
