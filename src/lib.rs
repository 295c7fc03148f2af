//! Storefront API
//!
//! REST backend for a storefront: shopping carts, favorites, reviews, user
//! registration/login/password reset, delivery orders and store administration.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Database**: MongoDB via the official async driver
//! - **Payments**: Stripe client handle built from the secret key
//! - **Format**: JSON or URL-encoded requests, JSON responses
//!
//! # Request Flow
//!
//! Every request passes the middleware [`middleware::pipeline::Pipeline`] in
//! order (trace, security headers, rate limit, CORS, timeout, body limit),
//! then is dispatched to a route group from [`routes::MOUNTS`]. Paths no
//! group claims fall through to static files and finally to a JSON 404.

pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod payments;
pub mod routes;
pub mod server;
pub mod store;
