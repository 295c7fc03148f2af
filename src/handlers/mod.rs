//! HTTP request handlers (route handlers).
//!
//! Each handler is an async function that:
//! 1. Receives HTTP request data (parsed body, URL params, route-group collection)
//! 2. Talks to the document store
//! 3. Returns HTTP response (JSON, status code)

/// Generic list/create/fetch/delete handlers shared by every route group
pub mod documents;
/// Liveness and database connectivity
pub mod health;

use crate::error::AppError;

/// Final fallback once no route and no static file matched.
pub async fn not_found() -> AppError {
    AppError::RouteNotFound
}
