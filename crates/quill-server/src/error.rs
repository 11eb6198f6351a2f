//! API error taxonomy and its HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use quill_content::ContentError;
use quill_db::SessionError;
use serde_json::json;
use thiserror::Error;

/// Errors surfaced by API and page handlers.
///
/// Three observable kinds, each mapped to an HTTP status: invalid input
/// (400), missing records (404), and everything else (500). Internal causes
/// are logged at the conversion site and never leak into the response body.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request payload failed validation.
    #[error("{0}")]
    Validation(String),

    /// The addressed record does not exist.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Any database, session, or rendering failure.
    #[error("internal server error")]
    Internal,
}

/// Marker stored in response extensions when a handler surfaced an
/// [`ApiError`]. The session middleware uses it to tell a reported error
/// apart from a handler that deliberately produced a 5xx response.
#[derive(Debug, Clone, Copy)]
pub struct HandlerError;

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response =
            (self.status(), Json(json!({ "error": self.to_string() }))).into_response();
        response.extensions_mut().insert(HandlerError);
        response
    }
}

impl From<ContentError> for ApiError {
    fn from(e: ContentError) -> Self {
        match e {
            ContentError::PostNotFound(_) => ApiError::NotFound("post"),
            ContentError::CommentNotFound(_) => ApiError::NotFound("comment"),
            ContentError::Database(ref err) => {
                tracing::error!(error = %err, "content operation failed");
                ApiError::Internal
            }
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(e: SessionError) -> Self {
        tracing::error!(error = %e, "database session failure");
        ApiError::Internal
    }
}
