//! Database layer for the quill blog backend.
//!
//! Provides SQLite connection pooling (via `r2d2`), WAL-mode initialization,
//! embedded SQL migrations, and the per-request [`DbSession`] unit of work.
//! Every table quill persists to is created through versioned migrations
//! managed by this crate.
//!
//! # Design decisions
//!
//! - **SQLite with WAL mode**: a blog backend is a single-server system; WAL
//!   mode allows concurrent readers with a single writer, which matches the
//!   read-heavy access pattern.
//! - **`r2d2` connection pool**: bounded connection reuse without manual
//!   lifetime management. Each HTTP request checks out exactly one
//!   connection, wrapped in a [`DbSession`].
//! - **Embedded migrations**: SQL files are compiled into the binary via
//!   `include_str!`, so the schema ships with the server and cannot drift
//!   from the code that depends on it.

mod migrations;
mod pool;
mod session;

pub use migrations::run_migrations;
pub use pool::{create_pool, DbPool, DbRuntimeSettings};
pub use session::{DbSession, SessionError, TxState};
