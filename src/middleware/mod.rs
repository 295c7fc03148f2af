//! HTTP middleware components.
//!
//! Middleware run before route handlers. They can:
//! - Add or strip response headers
//! - Count and reject requests
//! - Answer CORS preflights
//! - Short-circuit requests (rate-limit rejections, timeouts)
//!
//! [`pipeline`] decides which of them run and in what order.

/// Single-origin CORS policy
pub mod cors;
/// Ordered stage list applied to the router
pub mod pipeline;
/// Fixed-window per-client rate limiter
pub mod rate_limit;
/// Hardened response headers
pub mod security_headers;
