//! Comment handlers (JSON surface under `/posts/:id/comment`).
//!
//! The comment-to-post reference is checked by `quill-content` before any
//! insert, so commenting on a missing post reports 404 rather than leaving
//! an orphaned row.

use crate::error::ApiError;
use crate::middleware::SessionHandle;
use axum::extract::{Extension, Path};
use axum::http::StatusCode;
use axum::response::Json;
use quill_content::{create_comment, delete_comment, list_comments, Comment, NewComment};
use serde::Deserialize;
use serde_json::json;

/// Maximum length for a comment author name, in bytes.
const MAX_AUTHOR_LEN: usize = 128;
/// Maximum length for a comment body, in bytes.
const MAX_COMMENT_BODY_LEN: usize = 64 * 1024;

#[derive(Deserialize)]
pub struct CreateCommentRequest {
    pub author: String,
    pub body: String,
}

fn validate_comment(payload: &CreateCommentRequest) -> Result<(), ApiError> {
    if payload.author.trim().is_empty() {
        return Err(ApiError::Validation("author must not be empty".to_string()));
    }
    if payload.author.len() > MAX_AUTHOR_LEN {
        return Err(ApiError::Validation(format!(
            "author exceeds {MAX_AUTHOR_LEN} bytes"
        )));
    }
    if payload.body.trim().is_empty() {
        return Err(ApiError::Validation("body must not be empty".to_string()));
    }
    if payload.body.len() > MAX_COMMENT_BODY_LEN {
        return Err(ApiError::Validation(format!(
            "body exceeds {MAX_COMMENT_BODY_LEN} bytes"
        )));
    }
    Ok(())
}

/// POST /posts/:id/comment
pub async fn create_comment_handler(
    Extension(session): Extension<SessionHandle>,
    Path(post_id): Path<i64>,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<Comment>), ApiError> {
    validate_comment(&payload)?;

    let new_comment = NewComment {
        author: payload.author,
        body: payload.body,
    };
    let comment = session.with(|s| create_comment(s.conn(), post_id, &new_comment))?;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// GET /posts/:id/comment
pub async fn list_comments_handler(
    Extension(session): Extension<SessionHandle>,
    Path(post_id): Path<i64>,
) -> Result<Json<Vec<Comment>>, ApiError> {
    let comments = session.with(|s| list_comments(s.conn(), post_id))?;
    Ok(Json(comments))
}

/// DELETE /posts/:id/comment/:commentId
pub async fn delete_comment_handler(
    Extension(session): Extension<SessionHandle>,
    Path((post_id, comment_id)): Path<(i64, i64)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    session.with(|s| delete_comment(s.conn(), post_id, comment_id))?;
    Ok(Json(json!({"status": "deleted"})))
}
