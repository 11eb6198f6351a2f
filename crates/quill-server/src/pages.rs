//! Server-rendered HTML pages.
//!
//! Askama compiles the templates in `templates/` at build time; handlers
//! load data through the request session (GET, so no transaction) and
//! render to `Html<String>`.

use crate::error::ApiError;
use crate::middleware::SessionHandle;
use askama::Template;
use axum::extract::{Extension, Path};
use axum::response::Html;
use quill_content::{get_post, list_comments, list_posts, Comment, ContentError, Post};

#[derive(Template)]
#[template(path = "index.html")]
struct IndexTemplate {
    posts: Vec<Post>,
}

#[derive(Template)]
#[template(path = "post.html")]
struct PostTemplate {
    post: Post,
    comments: Vec<Comment>,
}

fn render<T: Template>(template: &T) -> Result<Html<String>, ApiError> {
    template.render().map(Html).map_err(|e| {
        tracing::error!(error = %e, "template render failed");
        ApiError::Internal
    })
}

/// GET /
pub async fn index_page_handler(
    Extension(session): Extension<SessionHandle>,
) -> Result<Html<String>, ApiError> {
    let posts = session.with(|s| list_posts(s.conn()))?;
    render(&IndexTemplate { posts })
}

/// GET /view/:id
pub async fn post_page_handler(
    Extension(session): Extension<SessionHandle>,
    Path(post_id): Path<i64>,
) -> Result<Html<String>, ApiError> {
    let (post, comments) = session.with(|s| {
        let post = get_post(s.conn(), post_id)?;
        let comments = list_comments(s.conn(), post_id)?;
        Ok::<_, ContentError>((post, comments))
    })?;
    render(&PostTemplate { post, comments })
}
