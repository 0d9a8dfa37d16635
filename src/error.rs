use axum::{http::StatusCode, response::IntoResponse};
use thiserror::Error;

use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum UploadsError {
    #[error("{0}")]
    Storage(#[from] StorageError),

    #[error("{0}")]
    IO(#[from] std::io::Error),

    #[error("{0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Base64(#[from] base64::DecodeError),

    #[error("{0}")]
    Config(String),
}

impl IntoResponse for UploadsError {
    fn into_response(self) -> axum::response::Response {
        match self {
            UploadsError::Storage(e) => {
                let status = match e {
                    StorageError::NotFound(_) => StatusCode::NOT_FOUND,
                    StorageError::AlreadyExists(_) => StatusCode::CONFLICT,
                    StorageError::InvalidPath(_) => StatusCode::BAD_REQUEST,
                    StorageError::Io(_) | StorageError::InvalidTimestamp(_) => {
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                (status, e.to_string()).into_response()
            }
            UploadsError::IO(e) => {
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
            }
            UploadsError::Json(e) => (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
            UploadsError::Base64(e) => (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
            UploadsError::Config(e) => (StatusCode::INTERNAL_SERVER_ERROR, e).into_response(),
        }
    }
}
