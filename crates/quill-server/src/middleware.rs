//! Per-request database session middleware.
//!
//! Opens one [`DbSession`] per request and demarcates a transaction from the
//! HTTP verb: POST/PUT/DELETE/PATCH run inside a transaction that this
//! middleware finishes after the handler returns; GET and HEAD run without
//! one. Handlers reach the session through the [`SessionHandle`] request
//! extension and never commit or roll back themselves.
//!
//! Commit/rollback policy for mutating requests, in order:
//! 1. the handler surfaced an [`ApiError`] (marker in response extensions):
//!    roll back, pass the typed error response through;
//! 2. the response status is 5xx without a marker: roll back, pass the
//!    handler's response through untouched;
//! 3. otherwise commit; a failed commit becomes a 500.
//!
//! The session itself is released on every path when the request's
//! extensions are dropped, and a session dropped mid-transaction rolls back.

use crate::error::{ApiError, HandlerError};
use crate::AppState;
use axum::body::Body;
use axum::http::{Method, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use quill_db::DbSession;
use std::sync::{Arc, Mutex};

/// Strongly-typed carrier for the request's database session.
///
/// The `Arc<Mutex<..>>` exists to satisfy the extension trait bounds; the
/// session is never shared across requests.
#[derive(Clone)]
pub struct SessionHandle(Arc<Mutex<DbSession>>);

impl SessionHandle {
    fn new(session: DbSession) -> Self {
        Self(Arc::new(Mutex::new(session)))
    }

    /// Runs `f` with exclusive access to the session.
    pub fn with<T>(&self, f: impl FnOnce(&mut DbSession) -> T) -> T {
        let mut guard = match self.0.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                // A handler panicked while holding the session. The state
                // machine is still consistent (drop rolls back an active
                // transaction), so recover the guard instead of failing
                // every later caller on this request.
                tracing::error!("database session lock poisoned, recovering");
                poisoned.into_inner()
            }
        };
        f(&mut guard)
    }
}

/// Whether the request method implies a state-changing operation.
fn is_mutating(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::DELETE | Method::PATCH
    )
}

/// Opens a session for the request and demarcates its transaction.
pub async fn session_middleware(mut req: Request<Body>, next: Next) -> Response {
    let state = match req.extensions().get::<Arc<AppState>>() {
        Some(state) => state.clone(),
        None => {
            tracing::error!("application state missing from request extensions");
            return ApiError::Internal.into_response();
        }
    };

    let session = match DbSession::open(&state.pool) {
        Ok(session) => session,
        Err(e) => {
            tracing::error!(error = %e, "failed to open database session");
            return ApiError::Internal.into_response();
        }
    };

    let mutating = is_mutating(req.method());
    let handle = SessionHandle::new(session);

    if mutating {
        if let Err(e) = handle.with(DbSession::begin) {
            tracing::error!(error = %e, "failed to begin transaction");
            return ApiError::Internal.into_response();
        }
    }

    req.extensions_mut().insert(handle.clone());
    let response = next.run(req).await;

    if !mutating {
        return response;
    }

    if response.extensions().get::<HandlerError>().is_some() {
        roll_back(&handle);
        return response;
    }

    if response.status().is_server_error() {
        // The handler produced a 5xx without reporting an error. Roll back
        // and pass its response through untouched.
        roll_back(&handle);
        return response;
    }

    match handle.with(DbSession::commit) {
        Ok(()) => response,
        Err(e) => {
            tracing::error!(error = %e, "failed to commit transaction");
            ApiError::Internal.into_response()
        }
    }
}

fn roll_back(handle: &SessionHandle) {
    if let Err(e) = handle.with(DbSession::rollback) {
        tracing::error!(error = %e, "failed to roll back transaction");
    }
}
