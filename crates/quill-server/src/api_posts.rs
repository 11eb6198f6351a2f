//! Post CRUD handlers (JSON surface under `/posts`).
//!
//! Each handler performs one logical data operation through the request's
//! [`SessionHandle`]; transaction boundaries belong to the session
//! middleware.

use crate::error::ApiError;
use crate::middleware::SessionHandle;
use axum::extract::{Extension, Path};
use axum::http::StatusCode;
use axum::response::Json;
use quill_content::{
    create_post, delete_post, get_post, list_posts, update_post, NewPost, Post, UpdatePost,
};
use serde::Deserialize;
use serde_json::json;

/// Maximum length for a post title, in bytes.
const MAX_TITLE_LEN: usize = 256;
/// Maximum length for a post body, in bytes.
const MAX_POST_BODY_LEN: usize = 64 * 1024;

#[derive(Deserialize)]
pub struct CreatePostRequest {
    pub title: String,
    pub body: String,
}

#[derive(Deserialize)]
pub struct UpdatePostRequest {
    pub title: Option<String>,
    pub body: Option<String>,
}

fn validate_title(title: &str) -> Result<(), ApiError> {
    if title.trim().is_empty() {
        return Err(ApiError::Validation("title must not be empty".to_string()));
    }
    if title.len() > MAX_TITLE_LEN {
        return Err(ApiError::Validation(format!(
            "title exceeds {MAX_TITLE_LEN} bytes"
        )));
    }
    Ok(())
}

fn validate_post_body(body: &str) -> Result<(), ApiError> {
    if body.trim().is_empty() {
        return Err(ApiError::Validation("body must not be empty".to_string()));
    }
    if body.len() > MAX_POST_BODY_LEN {
        return Err(ApiError::Validation(format!(
            "body exceeds {MAX_POST_BODY_LEN} bytes"
        )));
    }
    Ok(())
}

/// POST /posts
pub async fn create_post_handler(
    Extension(session): Extension<SessionHandle>,
    Json(payload): Json<CreatePostRequest>,
) -> Result<(StatusCode, Json<Post>), ApiError> {
    validate_title(&payload.title)?;
    validate_post_body(&payload.body)?;

    let new_post = NewPost {
        title: payload.title,
        body: payload.body,
    };
    let post = session.with(|s| create_post(s.conn(), &new_post))?;
    Ok((StatusCode::CREATED, Json(post)))
}

/// GET /posts
pub async fn list_posts_handler(
    Extension(session): Extension<SessionHandle>,
) -> Result<Json<Vec<Post>>, ApiError> {
    let posts = session.with(|s| list_posts(s.conn()))?;
    Ok(Json(posts))
}

/// GET /posts/:id
pub async fn get_post_handler(
    Extension(session): Extension<SessionHandle>,
    Path(post_id): Path<i64>,
) -> Result<Json<Post>, ApiError> {
    let post = session.with(|s| get_post(s.conn(), post_id))?;
    Ok(Json(post))
}

/// PUT /posts/:id
pub async fn update_post_handler(
    Extension(session): Extension<SessionHandle>,
    Path(post_id): Path<i64>,
    Json(payload): Json<UpdatePostRequest>,
) -> Result<Json<Post>, ApiError> {
    if let Some(ref title) = payload.title {
        validate_title(title)?;
    }
    if let Some(ref body) = payload.body {
        validate_post_body(body)?;
    }

    let updates = UpdatePost {
        title: payload.title,
        body: payload.body,
    };
    let post = session.with(|s| update_post(s.conn(), post_id, &updates))?;
    Ok(Json(post))
}

/// DELETE /posts/:id
pub async fn delete_post_handler(
    Extension(session): Extension<SessionHandle>,
    Path(post_id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    session.with(|s| delete_post(s.conn(), post_id))?;
    Ok(Json(json!({"status": "deleted"})))
}
