//! Request body parsing.
//!
//! [`Payload`] accepts either JSON or URL-encoded form bodies and hands the
//! handler a JSON object. A request without a body counts as an empty object.
//! Anything else is rejected with a client error.

use axum::{
    Form, Json,
    body::Bytes,
    extract::{
        FromRequest, Request,
        rejection::{BytesRejection, FormRejection, JsonRejection},
    },
    http::{StatusCode, header::CONTENT_TYPE},
};
use serde_json::{Map, Value};

use crate::error::AppError;

/// Parsed request body, always an object.
///
/// - `application/json`: must be a JSON object
/// - `application/x-www-form-urlencoded`: each field becomes a string value;
///   repeated keys keep the last value
/// - no `Content-Type` and an empty body: an empty object
#[derive(Debug, Clone, PartialEq)]
pub struct Payload(pub Map<String, Value>);

impl<S> FromRequest<S> for Payload
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Some(content_type) = req.headers().get(CONTENT_TYPE) else {
            let body = Bytes::from_request(req, state)
                .await
                .map_err(bytes_rejection)?;
            return if body.is_empty() {
                Ok(Payload(Map::new()))
            } else {
                Err(AppError::UnsupportedMediaType)
            };
        };
        let content_type = content_type
            .to_str()
            .unwrap_or_default()
            .to_ascii_lowercase();

        if content_type.starts_with("application/json") {
            let Json(value) = Json::<Value>::from_request(req, state)
                .await
                .map_err(json_rejection)?;
            match value {
                Value::Object(map) => Ok(Payload(map)),
                _ => Err(AppError::MalformedRequestBody(
                    "Expected a JSON object".to_string(),
                )),
            }
        } else if content_type.starts_with("application/x-www-form-urlencoded") {
            let Form(fields) = Form::<Vec<(String, String)>>::from_request(req, state)
                .await
                .map_err(form_rejection)?;
            Ok(Payload(
                fields
                    .into_iter()
                    .map(|(key, value)| (key, Value::String(value)))
                    .collect(),
            ))
        } else {
            Err(AppError::UnsupportedMediaType)
        }
    }
}

fn json_rejection(rejection: JsonRejection) -> AppError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge
    } else {
        AppError::MalformedRequestBody(rejection.body_text())
    }
}

fn bytes_rejection(rejection: BytesRejection) -> AppError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge
    } else {
        AppError::MalformedRequestBody(rejection.body_text())
    }
}

fn form_rejection(rejection: FormRejection) -> AppError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge
    } else {
        AppError::MalformedRequestBody(rejection.body_text())
    }
}
