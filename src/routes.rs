//! Route table.
//!
//! Binds each route group to its URL prefix and collection, and installs the
//! static-file fallback for everything else.
//!
//! Prefix matching is by specificity, not declaration order: the router ranks
//! static segments above parameters, so `/user/login` and
//! `/user/password-reset` are never captured by `/user/{id}`.

use axum::{Extension, Router, handler::HandlerWithoutStateExt, routing::get};
use tower_http::services::ServeDir;

use crate::{
    handlers::{
        self,
        documents::{Collection, create_document, delete_document, get_document, list_documents},
        health::health_check,
    },
    server::AppState,
};

/// A route group bound to a path prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mount {
    pub prefix: &'static str,
    pub collection: &'static str,
}

/// Every mounted route group, in declaration order.
pub const MOUNTS: [Mount; 8] = [
    // Customer routes
    Mount { prefix: "/cart", collection: "carts" },
    Mount { prefix: "/favorites", collection: "favorites" },
    Mount { prefix: "/reviews", collection: "reviews" },
    // User management routes
    Mount { prefix: "/user", collection: "users" },
    Mount { prefix: "/user/login", collection: "logins" },
    Mount { prefix: "/user/password-reset", collection: "password_resets" },
    // Delivery routes
    Mount { prefix: "/delivery", collection: "delivery_orders" },
    // Store admin routes
    Mount { prefix: "/storeAdmin", collection: "store_admin" },
];

/// Routes served under a single prefix.
fn group(collection: &'static str) -> Router<AppState> {
    Router::new()
        .route("/", get(list_documents).post(create_document))
        .route("/{id}", get(get_document).delete(delete_document))
        .layer(Extension(Collection(collection)))
}

/// All API routes: health check plus every entry of [`MOUNTS`].
pub fn api_routes() -> Router<AppState> {
    MOUNTS.iter().fold(
        Router::new().route("/health", get(health_check)),
        |router, mount| {
            tracing::debug!(
                prefix = mount.prefix,
                collection = mount.collection,
                "mounting route group"
            );
            router.nest(mount.prefix, group(mount.collection))
        },
    )
}

/// Serve files from `public_dir` for paths no route matched.
///
/// Content type is inferred from the file suffix and directory requests
/// resolve to `index.html`. Paths escaping the directory are refused. When
/// no file matches (for any method) the response is a JSON 404.
pub fn with_static_fallback(router: Router<AppState>, public_dir: &str) -> Router<AppState> {
    router.fallback_service(
        ServeDir::new(public_dir)
            .call_fallback_on_method_not_allowed(true)
            .not_found_service(handlers::not_found.into_service()),
    )
}
