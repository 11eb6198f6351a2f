//! Post and comment model for the quill blog backend.
//!
//! Implements post CRUD and comment persistence over a plain
//! `rusqlite::Connection`. Callers supply the connection — in the server
//! that is the per-request session, so these functions never begin, commit,
//! or roll back transactions themselves.
//!
//! The comment-to-post reference is enforced here at the application level:
//! comment operations verify the parent post exists and report
//! [`ContentError::PostNotFound`] otherwise. No SQL foreign key is declared.

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during post and comment operations.
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("post not found: {0}")]
    PostNotFound(i64),
    #[error("comment not found: {0}")]
    CommentNotFound(i64),
}

/// A blog post.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Post {
    /// Database ID (rowid).
    pub id: i64,
    /// Post title.
    pub title: String,
    /// Post body.
    pub body: String,
    /// Creation timestamp (ISO 8601).
    pub created_at: String,
    /// Last-update timestamp (ISO 8601).
    pub updated_at: String,
}

/// A comment on a post.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Comment {
    /// Database ID (rowid).
    pub id: i64,
    /// ID of the post this comment belongs to.
    pub post_id: i64,
    /// Display name of the comment author.
    pub author: String,
    /// Comment body.
    pub body: String,
    /// Creation timestamp (ISO 8601).
    pub created_at: String,
}

/// Parameters for creating a new post.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPost {
    pub title: String,
    pub body: String,
}

/// Parameters for updating an existing post.
///
/// `None` fields are left untouched.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdatePost {
    pub title: Option<String>,
    pub body: Option<String>,
}

/// Parameters for creating a new comment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewComment {
    pub author: String,
    pub body: String,
}

/// Creates a new post and returns the stored record.
pub fn create_post(conn: &Connection, new_post: &NewPost) -> Result<Post, ContentError> {
    conn.execute(
        "INSERT INTO posts (title, body) VALUES (?1, ?2)",
        params![new_post.title, new_post.body],
    )?;
    get_post(conn, conn.last_insert_rowid())
}

/// Retrieves a post by ID.
pub fn get_post(conn: &Connection, post_id: i64) -> Result<Post, ContentError> {
    conn.query_row(
        "SELECT id, title, body, created_at, updated_at FROM posts WHERE id = ?1",
        [post_id],
        map_row_to_post,
    )
    .optional()?
    .ok_or(ContentError::PostNotFound(post_id))
}

/// Lists all posts, newest first.
pub fn list_posts(conn: &Connection) -> Result<Vec<Post>, ContentError> {
    let mut stmt = conn.prepare(
        "SELECT id, title, body, created_at, updated_at
         FROM posts ORDER BY created_at DESC, id DESC",
    )?;

    let rows = stmt.query_map([], map_row_to_post)?;
    let mut posts = Vec::new();
    for row in rows {
        posts.push(row?);
    }
    Ok(posts)
}

/// Updates an existing post using a single atomic UPDATE statement.
///
/// Only fields that are `Some` in `updates` are modified. `updated_at` is
/// refreshed whenever any field changes. Returns the stored record after
/// the update.
pub fn update_post(
    conn: &Connection,
    post_id: i64,
    updates: &UpdatePost,
) -> Result<Post, ContentError> {
    let mut set_parts: Vec<String> = Vec::new();
    let mut values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
    let mut idx = 1usize;

    if let Some(title) = &updates.title {
        set_parts.push(format!("title = ?{}", idx));
        values.push(Box::new(title.clone()));
        idx += 1;
    }
    if let Some(body) = &updates.body {
        set_parts.push(format!("body = ?{}", idx));
        values.push(Box::new(body.clone()));
        idx += 1;
    }

    if set_parts.is_empty() {
        // Nothing to change; still report 404 for a missing post.
        return get_post(conn, post_id);
    }

    set_parts.push("updated_at = datetime('now')".to_string());

    let sql = format!(
        "UPDATE posts SET {} WHERE id = ?{}",
        set_parts.join(", "),
        idx
    );
    values.push(Box::new(post_id));

    let params: Vec<&dyn rusqlite::types::ToSql> = values.iter().map(|v| v.as_ref()).collect();
    let count = conn.execute(&sql, params.as_slice())?;
    if count == 0 {
        return Err(ContentError::PostNotFound(post_id));
    }
    get_post(conn, post_id)
}

/// Deletes a post and its comments.
///
/// Removing the comments here keeps the two statements inside whatever
/// transaction the caller's session has open, so a post can never vanish
/// while its comments survive.
pub fn delete_post(conn: &Connection, post_id: i64) -> Result<(), ContentError> {
    let count = conn.execute("DELETE FROM posts WHERE id = ?1", [post_id])?;
    if count == 0 {
        return Err(ContentError::PostNotFound(post_id));
    }
    conn.execute("DELETE FROM comments WHERE post_id = ?1", [post_id])?;
    Ok(())
}

/// Returns whether a post with the given ID exists.
pub fn post_exists(conn: &Connection, post_id: i64) -> Result<bool, ContentError> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM posts WHERE id = ?1)",
        [post_id],
        |row| row.get(0),
    )?;
    Ok(exists)
}

/// Creates a comment on an existing post and returns the stored record.
///
/// Fails with [`ContentError::PostNotFound`] if the post does not exist.
pub fn create_comment(
    conn: &Connection,
    post_id: i64,
    new_comment: &NewComment,
) -> Result<Comment, ContentError> {
    if !post_exists(conn, post_id)? {
        return Err(ContentError::PostNotFound(post_id));
    }

    conn.execute(
        "INSERT INTO comments (post_id, author, body) VALUES (?1, ?2, ?3)",
        params![post_id, new_comment.author, new_comment.body],
    )?;

    let comment_id = conn.last_insert_rowid();
    conn.query_row(
        "SELECT id, post_id, author, body, created_at FROM comments WHERE id = ?1",
        [comment_id],
        map_row_to_comment,
    )
    .optional()?
    .ok_or(ContentError::CommentNotFound(comment_id))
}

/// Lists all comments on a post, oldest first.
///
/// Fails with [`ContentError::PostNotFound`] if the post does not exist.
pub fn list_comments(conn: &Connection, post_id: i64) -> Result<Vec<Comment>, ContentError> {
    if !post_exists(conn, post_id)? {
        return Err(ContentError::PostNotFound(post_id));
    }

    let mut stmt = conn.prepare(
        "SELECT id, post_id, author, body, created_at
         FROM comments WHERE post_id = ?1 ORDER BY created_at ASC, id ASC",
    )?;

    let rows = stmt.query_map([post_id], map_row_to_comment)?;
    let mut comments = Vec::new();
    for row in rows {
        comments.push(row?);
    }
    Ok(comments)
}

/// Deletes a comment, scoped to its post.
///
/// The `post_id` scope means a comment can only be removed through the post
/// it belongs to; a mismatched pair reports [`ContentError::CommentNotFound`].
pub fn delete_comment(
    conn: &Connection,
    post_id: i64,
    comment_id: i64,
) -> Result<(), ContentError> {
    let count = conn.execute(
        "DELETE FROM comments WHERE id = ?1 AND post_id = ?2",
        params![comment_id, post_id],
    )?;
    if count == 0 {
        return Err(ContentError::CommentNotFound(comment_id));
    }
    Ok(())
}

fn map_row_to_post(row: &Row) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        title: row.get(1)?,
        body: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

fn map_row_to_comment(row: &Row) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: row.get(0)?,
        post_id: row.get(1)?,
        author: row.get(2)?,
        body: row.get(3)?,
        created_at: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().expect("should open in-memory db");
        quill_db::run_migrations(&conn).expect("migrations should succeed");
        conn
    }

    fn sample_post(conn: &Connection) -> Post {
        create_post(
            conn,
            &NewPost {
                title: "First post".to_string(),
                body: "Hello from quill.".to_string(),
            },
        )
        .expect("create_post should succeed")
    }

    #[test]
    fn create_and_get_post() {
        let conn = test_conn();
        let post = sample_post(&conn);

        assert_eq!(post.title, "First post");
        assert!(!post.created_at.is_empty());
        assert_eq!(post.created_at, post.updated_at);

        let fetched = get_post(&conn, post.id).expect("get_post should succeed");
        assert_eq!(fetched, post);
    }

    #[test]
    fn get_missing_post() {
        let conn = test_conn();
        let err = get_post(&conn, 42).expect_err("missing post should error");
        assert!(matches!(err, ContentError::PostNotFound(42)));
    }

    #[test]
    fn list_posts_newest_first() {
        let conn = test_conn();
        let first = sample_post(&conn);
        let second = create_post(
            &conn,
            &NewPost {
                title: "Second post".to_string(),
                body: "More words.".to_string(),
            },
        )
        .expect("create_post should succeed");

        let posts = list_posts(&conn).expect("list_posts should succeed");
        // Same-second timestamps fall back to descending ID order.
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].id, second.id);
        assert_eq!(posts[1].id, first.id);
    }

    #[test]
    fn update_post_partial() {
        let conn = test_conn();
        let post = sample_post(&conn);

        let updated = update_post(
            &conn,
            post.id,
            &UpdatePost {
                title: Some("Renamed".to_string()),
                body: None,
            },
        )
        .expect("update_post should succeed");

        assert_eq!(updated.title, "Renamed");
        assert_eq!(updated.body, post.body, "body should be untouched");
    }

    #[test]
    fn update_post_with_no_fields_checks_existence() {
        let conn = test_conn();
        let post = sample_post(&conn);

        let unchanged = update_post(&conn, post.id, &UpdatePost::default())
            .expect("empty update on existing post should succeed");
        assert_eq!(unchanged, post);

        let err = update_post(&conn, 999, &UpdatePost::default())
            .expect_err("empty update on missing post should error");
        assert!(matches!(err, ContentError::PostNotFound(999)));
    }

    #[test]
    fn update_missing_post() {
        let conn = test_conn();
        let err = update_post(
            &conn,
            7,
            &UpdatePost {
                title: Some("ghost".to_string()),
                body: None,
            },
        )
        .expect_err("updating a missing post should error");
        assert!(matches!(err, ContentError::PostNotFound(7)));
    }

    #[test]
    fn delete_post_removes_its_comments() {
        let conn = test_conn();
        let post = sample_post(&conn);
        create_comment(
            &conn,
            post.id,
            &NewComment {
                author: "ada".to_string(),
                body: "Nice one.".to_string(),
            },
        )
        .expect("create_comment should succeed");

        delete_post(&conn, post.id).expect("delete_post should succeed");

        let err = get_post(&conn, post.id).expect_err("post should be gone");
        assert!(matches!(err, ContentError::PostNotFound(_)));

        let orphans: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM comments WHERE post_id = ?1",
                [post.id],
                |row| row.get(0),
            )
            .expect("should count comments");
        assert_eq!(orphans, 0, "comments should be deleted with their post");
    }

    #[test]
    fn delete_missing_post() {
        let conn = test_conn();
        let err = delete_post(&conn, 13).expect_err("missing post should error");
        assert!(matches!(err, ContentError::PostNotFound(13)));
    }

    #[test]
    fn comment_on_missing_post_is_rejected() {
        let conn = test_conn();
        let err = create_comment(
            &conn,
            500,
            &NewComment {
                author: "ghost".to_string(),
                body: "anyone home?".to_string(),
            },
        )
        .expect_err("comment on missing post should error");
        assert!(matches!(err, ContentError::PostNotFound(500)));
    }

    #[test]
    fn create_and_list_comments() {
        let conn = test_conn();
        let post = sample_post(&conn);

        let first = create_comment(
            &conn,
            post.id,
            &NewComment {
                author: "ada".to_string(),
                body: "First!".to_string(),
            },
        )
        .expect("create_comment should succeed");
        let second = create_comment(
            &conn,
            post.id,
            &NewComment {
                author: "grace".to_string(),
                body: "Second.".to_string(),
            },
        )
        .expect("create_comment should succeed");

        let comments = list_comments(&conn, post.id).expect("list_comments should succeed");
        assert_eq!(comments, vec![first, second], "oldest first");
    }

    #[test]
    fn list_comments_on_missing_post() {
        let conn = test_conn();
        let err = list_comments(&conn, 9).expect_err("missing post should error");
        assert!(matches!(err, ContentError::PostNotFound(9)));
    }

    #[test]
    fn delete_comment_is_scoped_to_post() {
        let conn = test_conn();
        let post = sample_post(&conn);
        let other = create_post(
            &conn,
            &NewPost {
                title: "Other".to_string(),
                body: "Other body.".to_string(),
            },
        )
        .expect("create_post should succeed");

        let comment = create_comment(
            &conn,
            post.id,
            &NewComment {
                author: "ada".to_string(),
                body: "On the first post.".to_string(),
            },
        )
        .expect("create_comment should succeed");

        // Wrong post in the path: not deletable.
        let err = delete_comment(&conn, other.id, comment.id)
            .expect_err("mismatched post should error");
        assert!(matches!(err, ContentError::CommentNotFound(_)));

        delete_comment(&conn, post.id, comment.id).expect("scoped delete should succeed");

        let err = delete_comment(&conn, post.id, comment.id)
            .expect_err("second delete should error");
        assert!(matches!(err, ContentError::CommentNotFound(_)));
    }
}
