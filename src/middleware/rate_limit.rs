//! Fixed-window rate limiting.
//!
//! Every client key gets a window that opens on its first request. Inside the
//! window at most `max_requests` requests pass; the rest are rejected with
//! HTTP 429 before reaching any later stage. When the window has elapsed the
//! next request opens a fresh one.
//!
//! Counters live in a [`DashMap`]. The check and the increment for one key
//! happen under that key's shard lock, so concurrent requests from the same
//! client can never overspend the budget.

use std::{
    net::SocketAddr,
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;
use tokio::task::JoinHandle;

use crate::error::AppError;

/// Key used when neither the peer address nor a forwarded hop is known.
const UNKNOWN_CLIENT: &str = "unknown";

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// Outcome of a single rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed {
        remaining: u32,
        reset_after: Duration,
    },
    Limited {
        retry_after: Duration,
    },
}

/// Shared per-client request counters.
#[derive(Debug)]
pub struct RateLimiter {
    window: Duration,
    max_requests: u32,
    trust_proxy: bool,
    clients: DashMap<String, Window>,
}

impl RateLimiter {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
            trust_proxy: false,
            clients: DashMap::new(),
        }
    }

    /// Key clients by the first `X-Forwarded-For` hop when present.
    pub fn trust_proxy(mut self, trust: bool) -> Self {
        self.trust_proxy = trust;
        self
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    /// Count one request for `key` at time `now`.
    pub fn check(&self, key: &str, now: Instant) -> Decision {
        let mut entry = self.clients.entry(key.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });

        if now.saturating_duration_since(entry.started) >= self.window {
            entry.started = now;
            entry.count = 0;
        }

        let reset_after = self
            .window
            .saturating_sub(now.saturating_duration_since(entry.started));

        if entry.count >= self.max_requests {
            return Decision::Limited {
                retry_after: reset_after,
            };
        }

        entry.count += 1;
        Decision::Allowed {
            remaining: self.max_requests - entry.count,
            reset_after,
        }
    }

    /// Drop every window that has fully elapsed.
    pub fn prune(&self, now: Instant) {
        self.clients
            .retain(|_, window| now.saturating_duration_since(window.started) < self.window);
    }

    /// Number of clients currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.clients.len()
    }

    /// Periodically prune expired windows so idle clients do not accumulate.
    pub fn spawn_sweeper(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let before = self.tracked_clients();
                self.prune(Instant::now());
                tracing::debug!(
                    pruned = before.saturating_sub(self.tracked_clients()),
                    "rate limiter sweep"
                );
            }
        })
    }

    fn client_key(&self, request: &Request) -> String {
        if self.trust_proxy {
            if let Some(hop) = first_forwarded_hop(request.headers()) {
                return hop;
            }
        }

        request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
            .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
    }
}

fn first_forwarded_hop(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|hop| !hop.is_empty())
        .map(str::to_string)
}

/// Whole seconds, rounded up so clients never retry early.
fn ceil_secs(duration: Duration) -> u64 {
    let secs = duration.as_secs();
    if duration.subsec_nanos() > 0 { secs + 1 } else { secs }
}

/// Rate-limiting middleware function.
///
/// # Flow
///
/// 1. Derive the client key (peer IP, or forwarded hop behind a trusted proxy)
/// 2. Count the request against the client's current window
/// 3. Over the limit: return 429 with `Retry-After`, without calling `next`
/// 4. Otherwise: call the next stage and attach `RateLimit-*` headers
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let key = limiter.client_key(&request);

    match limiter.check(&key, Instant::now()) {
        Decision::Limited { retry_after } => {
            tracing::warn!(client = %key, "rate limit exceeded");
            Err(AppError::RateLimitExceeded {
                retry_after_secs: ceil_secs(retry_after).max(1),
            })
        }
        Decision::Allowed {
            remaining,
            reset_after,
        } => {
            let mut response = next.run(request).await;
            let headers = response.headers_mut();
            headers.insert(
                HeaderName::from_static("ratelimit-limit"),
                HeaderValue::from(limiter.max_requests()),
            );
            headers.insert(
                HeaderName::from_static("ratelimit-remaining"),
                HeaderValue::from(remaining),
            );
            headers.insert(
                HeaderName::from_static("ratelimit-reset"),
                HeaderValue::from(ceil_secs(reset_after)),
            );
            Ok(response)
        }
    }
}
