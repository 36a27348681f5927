use crate::storage::StorageError;
use crate::upstream::UpstreamError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;
use utoipa::ToSchema;

#[derive(ThisError, Debug)]
pub enum Error {
    /// The request itself could not be understood (wrong content type, missing part, bad JSON)
    #[error("{message}")]
    Unprocessable { message: String },

    /// Writing the document to object storage failed
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The document service failed, timed out or answered with something unusable
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Body of every error response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    pub detail: String,
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Unprocessable { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Error::Storage(_) | Error::Upstream(_) | Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The `detail` string returned to the caller. Internal failures carry the underlying message,
    /// so callers can tell storage problems from document service problems by reading it.
    pub fn detail(&self) -> String {
        match self {
            Error::Unprocessable { message } => message.clone(),
            Error::Storage(_) | Error::Upstream(_) | Error::Other(_) => format!("An error occurred: {self:#}"),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match &self {
            Error::Storage(_) | Error::Upstream(_) | Error::Other(_) => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::Unprocessable { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let body = ErrorDetail { detail: self.detail() };
        (self.status_code(), Json(body)).into_response()
    }
}

/// Type alias for handler results
pub type Result<T> = std::result::Result<T, Error>;
