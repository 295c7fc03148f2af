//! Cross-origin policy.
//!
//! One origin, three methods, two request headers. There is no permissive
//! layer anywhere else in the stack, so this is the whole policy.

use std::time::Duration;

use axum::{
    extract::State,
    http::{
        HeaderValue, Method,
        header::{ACCESS_CONTROL_ALLOW_ORIGIN, AUTHORIZATION, CONTENT_TYPE, VARY},
    },
    response::Response,
};
use tower_http::cors::CorsLayer;

use crate::error::StartupError;

pub const ALLOWED_METHODS: [Method; 3] = [Method::GET, Method::POST, Method::DELETE];

/// Build the CORS layer for `allowed_origin` (e.g. `http://localhost:3000`).
///
/// `Access-Control-Allow-Origin` is sent on every response. Allowed methods
/// and headers are answered on preflight requests.
///
/// # Errors
///
/// Returns [`StartupError::InvalidConfiguration`] if the origin is not a
/// valid header value or is the `*` wildcard.
pub fn cors_layer(allowed_origin: &str) -> Result<CorsLayer, StartupError> {
    Ok(CorsLayer::new()
        .allow_origin(origin_header(allowed_origin)?)
        .allow_methods(ALLOWED_METHODS)
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(Duration::from_secs(60 * 60)))
}

/// Parse `ALLOWED_ORIGIN` into the header value sent back to browsers.
pub fn origin_header(allowed_origin: &str) -> Result<HeaderValue, StartupError> {
    if allowed_origin.trim() == "*" {
        return Err(StartupError::InvalidConfiguration(
            "ALLOWED_ORIGIN must name a single origin, not '*'".to_string(),
        ));
    }

    HeaderValue::from_str(allowed_origin.trim()).map_err(|_| {
        StartupError::InvalidConfiguration(format!("ALLOWED_ORIGIN: {allowed_origin:?}"))
    })
}

/// Response mapper for stages that answer before the CORS layer runs.
///
/// A rejected request never reaches [`cors_layer`], so the allowed origin is
/// filled in here. Responses that already carry it are left alone.
pub async fn fill_allow_origin(
    State(origin): State<HeaderValue>,
    mut response: Response,
) -> Response {
    let headers = response.headers_mut();
    if !headers.contains_key(ACCESS_CONTROL_ALLOW_ORIGIN) {
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin);
        headers.append(VARY, HeaderValue::from_static("origin"));
    }
    response
}
