//! The ordered middleware chain as a value.
//!
//! [`Pipeline`] lists the stages wrapped around the router. The first stage
//! is the outermost layer and sees every request first. Building the list
//! from [`Config`] keeps the presence and order of each stage reviewable in
//! one place instead of scattered across `.layer` calls.

use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    extract::{DefaultBodyLimit, Request},
    http::{HeaderValue, StatusCode},
    middleware as axum_middleware,
    response::Response,
};
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use uuid::Uuid;

use crate::{
    config::Config,
    error::StartupError,
    middleware::{
        cors::{cors_layer, fill_allow_origin, origin_header},
        rate_limit::RateLimiter,
        rate_limit::rate_limit_middleware,
        security_headers::security_headers_middleware,
    },
};

/// One request interceptor in the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Request/response tracing with a per-request id
    Trace,
    /// CSP, anti-framing and friends
    SecurityHeaders,
    /// Fixed-window per-client limiter
    RateLimit,
    /// Single-origin CORS policy
    Cors,
    /// 408 once a request runs past the configured timeout
    Timeout,
    /// Caps request bodies before the payload extractor parses them
    BodyLimit,
}

/// Everything the stages need that is created once at startup.
#[derive(Clone)]
pub struct PipelineContext {
    pub limiter: Arc<RateLimiter>,
    pub cors: CorsLayer,
    pub allowed_origin: HeaderValue,
    pub request_timeout: Duration,
    pub body_limit: usize,
}

impl PipelineContext {
    pub fn from_config(config: &Config, limiter: Arc<RateLimiter>) -> Result<Self, StartupError> {
        Ok(Self {
            limiter,
            cors: cors_layer(&config.allowed_origin)?,
            allowed_origin: origin_header(&config.allowed_origin)?,
            request_timeout: config.request_timeout(),
            body_limit: config.body_limit_bytes,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    /// Default chain: trace, security headers (unless disabled), rate limit,
    /// CORS, timeout, body limit.
    pub fn from_config(config: &Config) -> Self {
        let mut stages = vec![Stage::Trace];
        if config.security_headers {
            stages.push(Stage::SecurityHeaders);
        }
        stages.extend([
            Stage::RateLimit,
            Stage::Cors,
            Stage::Timeout,
            Stage::BodyLimit,
        ]);
        Self { stages }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn contains(&self, stage: Stage) -> bool {
        self.stages.contains(&stage)
    }

    /// Wrap `router` so that `stages()[0]` is the outermost layer.
    ///
    /// Axum runs the most recently added layer first, so the list is applied
    /// back to front.
    pub fn apply(&self, router: Router, context: &PipelineContext) -> Router {
        self.stages
            .iter()
            .rev()
            .fold(router, |router, stage| wrap(router, *stage, context))
    }
}

fn wrap(router: Router, stage: Stage, context: &PipelineContext) -> Router {
    match stage {
        Stage::Trace => router.layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request| {
                    let request_id = Uuid::new_v4();
                    tracing::info_span!(
                        "http_request",
                        %request_id,
                        method = %request.method(),
                        uri = %request.uri(),
                    )
                })
                .on_response(
                    |response: &Response, latency: Duration, span: &tracing::Span| {
                        tracing::info!(
                            parent: span,
                            status = %response.status(),
                            latency_ms = %latency.as_millis(),
                            "response"
                        );
                    },
                ),
        ),
        Stage::SecurityHeaders => {
            router.layer(axum_middleware::from_fn(security_headers_middleware))
        }
        // 429s never reach the CORS stage, so the origin is attached here too
        Stage::RateLimit => router
            .layer(axum_middleware::from_fn_with_state(
                context.limiter.clone(),
                rate_limit_middleware,
            ))
            .layer(axum_middleware::map_response_with_state(
                context.allowed_origin.clone(),
                fill_allow_origin,
            )),
        Stage::Cors => router.layer(context.cors.clone()),
        Stage::Timeout => router.layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            context.request_timeout,
        )),
        Stage::BodyLimit => router.layer(DefaultBodyLimit::max(context.body_limit)),
    }
}
