//! Error types and HTTP error response handling.
//!
//! Two families of errors live here:
//!
//! - [`StartupError`]: fatal problems while configuring, connecting or binding.
//!   They are logged and end the process.
//! - [`AppError`]: request-phase failures. Each one is converted into an HTTP
//!   response and only ever affects the request that produced it.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::store::StoreError;

/// Plain-text body returned to clients that exceed the rate limit.
pub const RATE_LIMIT_MESSAGE: &str = "Too many requests from this IP, please try again later.";

/// Failures that abort startup.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// A required environment variable is absent or blank.
    #[error("Missing required configuration: {0}")]
    ConfigurationMissing(String),

    /// A configuration value is present but unusable.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The database could not be reached within the configured attempts.
    #[error("Database connection failed after {attempts} attempt(s): {source}")]
    DatabaseConnectFailure {
        attempts: u32,
        #[source]
        source: mongodb::error::Error,
    },

    #[error("Payment client initialization failed: {0}")]
    PaymentClient(#[from] reqwest::Error),

    #[error("Failed to bind listener on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Request-phase error type.
///
/// Each variant maps to a specific HTTP status code and error message.
///
/// # Error Categories
///
/// - **Traffic control**: the client exceeded its rate-limit window
/// - **Request body**: malformed, oversized or of an unsupported type
/// - **Routing**: nothing (route, static file or document) matched
/// - **Storage**: the document store failed
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Client exceeded the per-window request budget.
    ///
    /// Returns HTTP 429 with a plain-text body and a `Retry-After` header.
    #[error("Too many requests from this IP, please try again later.")]
    RateLimitExceeded { retry_after_secs: u64 },

    /// Request body could not be parsed.
    ///
    /// Returns HTTP 400 Bad Request.
    #[error("Malformed request body: {0}")]
    MalformedRequestBody(String),

    /// Returns HTTP 413 Payload Too Large.
    #[error("Request body too large")]
    PayloadTooLarge,

    /// Body is neither JSON nor URL-encoded form data.
    ///
    /// Returns HTTP 415 Unsupported Media Type.
    #[error("Expected an application/json or application/x-www-form-urlencoded body")]
    UnsupportedMediaType,

    /// Requested document does not exist in its collection.
    ///
    /// Returns HTTP 404 Not Found.
    #[error("Document not found")]
    DocumentNotFound,

    /// No route and no static file matched the request path.
    ///
    /// Returns HTTP 404 Not Found.
    #[error("Route not found")]
    RouteNotFound,

    /// Document store operation failed.
    ///
    /// Returns HTTP 500 without exposing the underlying error.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Convert AppError into an HTTP response.
///
/// # Response Format
///
/// All errors except rate limiting return JSON in this format:
/// ```json
/// {
///   "error": {
///     "code": "error_type",
///     "message": "Human-readable error message"
///   }
/// }
/// ```
///
/// Rate limiting answers with the bare [`RATE_LIMIT_MESSAGE`] text.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::RateLimitExceeded { retry_after_secs } => {
                let mut response = (StatusCode::TOO_MANY_REQUESTS, RATE_LIMIT_MESSAGE).into_response();
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
                return response;
            }
            AppError::MalformedRequestBody(ref msg) => {
                (StatusCode::BAD_REQUEST, "malformed_request_body", msg.clone())
            }
            AppError::PayloadTooLarge => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "payload_too_large",
                self.to_string(),
            ),
            AppError::UnsupportedMediaType => (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "unsupported_media_type",
                self.to_string(),
            ),
            AppError::DocumentNotFound => {
                (StatusCode::NOT_FOUND, "document_not_found", self.to_string())
            }
            AppError::RouteNotFound => (StatusCode::NOT_FOUND, "route_not_found", self.to_string()),
            AppError::Store(ref err) => {
                tracing::error!(error = %err, "document store failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
