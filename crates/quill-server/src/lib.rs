//! Quill server library logic.

pub mod api_comments;
pub mod api_posts;
pub mod config;
pub mod error;
pub mod middleware;
pub mod pages;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Extension, Json, Router,
};
use quill_db::DbPool;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: DbPool,
}

/// Maximum request body size (2 MiB). Protects against OOM from oversized payloads.
const MAX_REQUEST_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Health check handler.
///
/// Returns `200 OK` with server status and version. Used by load balancers,
/// monitoring, and CI to verify the server is running.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/", get(pages::index_page_handler))
        .route("/view/{id}", get(pages::post_page_handler))
        .route(
            "/posts",
            post(api_posts::create_post_handler).get(api_posts::list_posts_handler),
        )
        .route(
            "/posts/{id}",
            get(api_posts::get_post_handler)
                .put(api_posts::update_post_handler)
                .delete(api_posts::delete_post_handler),
        )
        .route(
            "/posts/{id}/comment",
            post(api_comments::create_comment_handler).get(api_comments::list_comments_handler),
        )
        .route(
            "/posts/{id}/comment/{commentId}",
            delete(api_comments::delete_comment_handler),
        )
        .layer(axum::middleware::from_fn(middleware::session_middleware))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(Extension(Arc::new(state)))
}
