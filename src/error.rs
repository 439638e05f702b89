use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::api::ErrorResponse;

/// Outcome of a book operation that did not produce a book.
///
/// Every variant is answered with 200 OK. The kind is carried by the body:
/// plain text for expected conditions, `{"error": ..}` JSON for store failures.
#[derive(Debug, thiserror::Error)]
pub enum BookError {
    #[error("no book exists")]
    NotFound,
    #[error("missing required field {0}")]
    MissingField(&'static str),
    #[error("no book deletes")]
    NothingDeleted,
    #[error("no comment adds")]
    CommentNotAdded,
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl IntoResponse for BookError {
    fn into_response(self) -> Response {
        match self {
            BookError::Store(e) => {
                let message = crate::unpack_error(e.as_ref());
                tracing::error!(error = %message, "store operation failed");
                (StatusCode::OK, Json(ErrorResponse { error: message })).into_response()
            }
            other => {
                tracing::info!(outcome = %other, "request not fulfilled");
                (StatusCode::OK, other.to_string()).into_response()
            }
        }
    }
}
