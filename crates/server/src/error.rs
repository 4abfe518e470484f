use axum::{
    extract::rejection::{BytesRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use shared::{error::SERVER_ERROR_MESSAGE, protocol::Envelope};
use thiserror::Error;
use tracing::error;

pub const RECORD_MISSING_MESSAGE: &str = "Record does not exist";

/// Failures raised outside the controllers: extraction and plumbing.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Unreadable request body: {0}")]
    UnreadableBody(#[from] BytesRejection),

    #[error("Invalid path parameter: {0}")]
    MalformedPath(#[from] PathRejection),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::UnreadableBody(rejection) => rejection.status(),
            AppError::MalformedPath(_) => StatusCode::BAD_REQUEST,
            AppError::Store(err) if storage::is_record_missing(err) => StatusCode::NOT_FOUND,
            AppError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::UnreadableBody(_) | AppError::MalformedPath(_) => self.to_string(),
            AppError::Store(err) if status == StatusCode::NOT_FOUND => {
                error!(error = ?err, "record missing");
                RECORD_MISSING_MESSAGE.to_string()
            }
            AppError::Store(err) => {
                error!(error = ?err, "unhandled error");
                SERVER_ERROR_MESSAGE.to_string()
            }
        };

        (status, Json(Envelope::message(status.as_u16(), message))).into_response()
    }
}
