//! Per-request database session with explicit transaction demarcation.
//!
//! A [`DbSession`] wraps one pooled connection for the lifetime of one HTTP
//! request. The session owns zero or one transaction, tracked by a small
//! state machine: once a transaction has been committed or rolled back it
//! cannot be touched again, and a session dropped with an active transaction
//! rolls it back. Transaction boundaries belong to the HTTP layer's session
//! middleware; request handlers only read and write through [`DbSession::conn`].

use crate::pool::DbPool;
use r2d2::PooledConnection;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use thiserror::Error;

/// Errors that can occur during session and transaction handling.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Failed to check a connection out of the pool.
    #[error("failed to acquire database connection: {0}")]
    Acquire(#[from] r2d2::Error),

    /// `begin` was called while a transaction is already active.
    #[error("transaction already active")]
    AlreadyActive,

    /// `commit` or `rollback` was called without an active transaction.
    #[error("no active transaction")]
    NotActive,

    /// The session's transaction has already been committed or rolled back.
    #[error("transaction already finished")]
    Finished,

    /// The underlying SQLite statement failed.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Transaction state of a [`DbSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    /// No transaction was ever begun (read-only session).
    None,
    /// A transaction is open and must be committed or rolled back.
    Active,
    /// The transaction was committed. Terminal.
    Committed,
    /// The transaction was rolled back. Terminal.
    RolledBack,
}

/// A unit-of-work handle bound to exactly one request's lifetime.
///
/// The connection returns to the pool when the session is dropped, on every
/// exit path. An active transaction at drop time is rolled back first, so a
/// handler panic can never leave a transaction open on a pooled connection.
pub struct DbSession {
    conn: PooledConnection<SqliteConnectionManager>,
    tx: TxState,
}

impl DbSession {
    /// Checks a connection out of the pool and wraps it in a fresh session.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Acquire` if the pool is exhausted or the
    /// connection cannot be established.
    pub fn open(pool: &DbPool) -> Result<Self, SessionError> {
        Ok(Self {
            conn: pool.get()?,
            tx: TxState::None,
        })
    }

    /// The underlying connection, for reads and writes.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Current transaction state.
    pub fn tx_state(&self) -> TxState {
        self.tx
    }

    /// Begins a transaction.
    ///
    /// Uses `BEGIN IMMEDIATE` so the write lock is taken up front; under WAL
    /// a deferred transaction could fail with `SQLITE_BUSY` at the first
    /// write instead.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyActive` if a transaction is open, `Finished` if one
    /// has already completed, or `Database` if the statement fails.
    pub fn begin(&mut self) -> Result<(), SessionError> {
        match self.tx {
            TxState::None => {
                self.conn.execute_batch("BEGIN IMMEDIATE")?;
                self.tx = TxState::Active;
                Ok(())
            }
            TxState::Active => Err(SessionError::AlreadyActive),
            TxState::Committed | TxState::RolledBack => Err(SessionError::Finished),
        }
    }

    /// Commits the active transaction.
    ///
    /// On a commit failure the transaction is left in `Active` state; the
    /// drop handler will roll it back before the connection returns to the
    /// pool.
    ///
    /// # Errors
    ///
    /// Returns `NotActive` if no transaction was begun, `Finished` if the
    /// transaction already completed, or `Database` if the commit fails.
    pub fn commit(&mut self) -> Result<(), SessionError> {
        match self.tx {
            TxState::Active => {
                self.conn.execute_batch("COMMIT")?;
                self.tx = TxState::Committed;
                Ok(())
            }
            TxState::None => Err(SessionError::NotActive),
            TxState::Committed | TxState::RolledBack => Err(SessionError::Finished),
        }
    }

    /// Rolls back the active transaction.
    ///
    /// # Errors
    ///
    /// Returns `NotActive` if no transaction was begun, `Finished` if the
    /// transaction already completed, or `Database` if the rollback fails.
    pub fn rollback(&mut self) -> Result<(), SessionError> {
        match self.tx {
            TxState::Active => {
                self.conn.execute_batch("ROLLBACK")?;
                self.tx = TxState::RolledBack;
                Ok(())
            }
            TxState::None => Err(SessionError::NotActive),
            TxState::Committed | TxState::RolledBack => Err(SessionError::Finished),
        }
    }
}

impl Drop for DbSession {
    fn drop(&mut self) {
        if self.tx == TxState::Active {
            tracing::warn!("session dropped with active transaction, rolling back");
            if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                tracing::error!(error = %e, "failed to roll back transaction on session drop");
            }
            self.tx = TxState::RolledBack;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{create_pool, DbRuntimeSettings};
    use tempfile::TempDir;

    fn test_pool() -> (TempDir, DbPool) {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let db_path = dir.path().join("session_test.db");
        let pool = create_pool(
            db_path.to_str().expect("path should be utf-8"),
            DbRuntimeSettings::default(),
        )
        .expect("pool creation should succeed");

        {
            let conn = pool.get().expect("should get a connection");
            conn.execute_batch("CREATE TABLE probe (id INTEGER PRIMARY KEY, label TEXT NOT NULL);")
                .expect("should create probe table");
        }

        (dir, pool)
    }

    fn probe_count(pool: &DbPool) -> i64 {
        let conn = pool.get().expect("should get a connection");
        conn.query_row("SELECT COUNT(*) FROM probe", [], |row| row.get(0))
            .expect("should count probe rows")
    }

    #[test]
    fn commit_makes_writes_visible() {
        let (_dir, pool) = test_pool();
        let mut session = DbSession::open(&pool).expect("should open session");

        session.begin().expect("begin should succeed");
        session
            .conn()
            .execute("INSERT INTO probe (label) VALUES ('committed')", [])
            .expect("insert should succeed");
        session.commit().expect("commit should succeed");

        assert_eq!(session.tx_state(), TxState::Committed);
        assert_eq!(probe_count(&pool), 1);
    }

    #[test]
    fn rollback_discards_writes() {
        let (_dir, pool) = test_pool();
        let mut session = DbSession::open(&pool).expect("should open session");

        session.begin().expect("begin should succeed");
        session
            .conn()
            .execute("INSERT INTO probe (label) VALUES ('discarded')", [])
            .expect("insert should succeed");
        session.rollback().expect("rollback should succeed");

        assert_eq!(session.tx_state(), TxState::RolledBack);
        assert_eq!(probe_count(&pool), 0);
    }

    #[test]
    fn commit_is_exactly_once() {
        let (_dir, pool) = test_pool();
        let mut session = DbSession::open(&pool).expect("should open session");

        session.begin().expect("begin should succeed");
        session.commit().expect("first commit should succeed");

        assert!(matches!(session.commit(), Err(SessionError::Finished)));
        assert!(matches!(session.rollback(), Err(SessionError::Finished)));
        assert!(matches!(session.begin(), Err(SessionError::Finished)));
    }

    #[test]
    fn begin_twice_is_rejected() {
        let (_dir, pool) = test_pool();
        let mut session = DbSession::open(&pool).expect("should open session");

        session.begin().expect("begin should succeed");
        assert!(matches!(session.begin(), Err(SessionError::AlreadyActive)));
    }

    #[test]
    fn finish_without_begin_is_rejected() {
        let (_dir, pool) = test_pool();
        let mut session = DbSession::open(&pool).expect("should open session");

        assert!(matches!(session.commit(), Err(SessionError::NotActive)));
        assert!(matches!(session.rollback(), Err(SessionError::NotActive)));
    }

    #[test]
    fn drop_with_active_transaction_rolls_back() {
        let (_dir, pool) = test_pool();

        {
            let mut session = DbSession::open(&pool).expect("should open session");
            session.begin().expect("begin should succeed");
            session
                .conn()
                .execute("INSERT INTO probe (label) VALUES ('leaked')", [])
                .expect("insert should succeed");
            // Session dropped here without commit or rollback.
        }

        assert_eq!(probe_count(&pool), 0);
    }

    #[test]
    fn writes_without_transaction_autocommit() {
        let (_dir, pool) = test_pool();

        {
            let session = DbSession::open(&pool).expect("should open session");
            session
                .conn()
                .execute("INSERT INTO probe (label) VALUES ('autocommit')", [])
                .expect("insert should succeed");
            assert_eq!(session.tx_state(), TxState::None);
        }

        assert_eq!(probe_count(&pool), 1);
    }

    #[test]
    fn session_returns_connection_to_pool_on_drop() {
        // A one-connection pool exposes any leak immediately: the second
        // open would time out if the first session kept its connection.
        let dir = tempfile::tempdir().expect("should create temp dir");
        let db_path = dir.path().join("leak_test.db");
        let pool = create_pool(
            db_path.to_str().expect("path should be utf-8"),
            DbRuntimeSettings {
                busy_timeout_ms: 100,
                pool_max_size: 1,
            },
        )
        .expect("pool creation should succeed");

        {
            let conn = pool.get().expect("should get a connection");
            conn.execute_batch("CREATE TABLE probe (id INTEGER PRIMARY KEY, label TEXT NOT NULL);")
                .expect("should create probe table");
        }

        for _ in 0..5 {
            let mut session = DbSession::open(&pool).expect("should reopen session");
            session.begin().expect("begin should succeed");
            session
                .conn()
                .execute("INSERT INTO probe (label) VALUES ('cycle')", [])
                .expect("insert should succeed");
            session.commit().expect("commit should succeed");
        }

        assert_eq!(probe_count(&pool), 5);
    }
}
