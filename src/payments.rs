//! Payment provider client.
//!
//! Holds an authenticated HTTP client for the Stripe REST API. It is built
//! once at startup from `STRIPE_PRIVATE_KEY` and kept in application state.

use std::{fmt, time::Duration};

use reqwest::{
    Method, RequestBuilder,
    header::{AUTHORIZATION, HeaderMap, HeaderValue},
};

use crate::error::StartupError;

pub const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

/// Authenticated handle to the payment provider.
///
/// # Security
///
/// The secret key is only stored inside the default `Authorization` header
/// of the underlying client. `Debug` never prints it.
#[derive(Clone)]
pub struct PaymentClient {
    http: reqwest::Client,
    api_base: String,
}

impl PaymentClient {
    /// Build a client that authenticates every request with `secret_key`.
    ///
    /// # Errors
    ///
    /// - [`StartupError::InvalidConfiguration`] if the key is not a valid header value
    /// - [`StartupError::PaymentClient`] if the HTTP client cannot be constructed
    pub fn new(secret_key: &str, timeout: Duration) -> Result<Self, StartupError> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {secret_key}")).map_err(|_| {
            StartupError::InvalidConfiguration(
                "STRIPE_PRIVATE_KEY contains invalid characters".to_string(),
            )
        })?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            api_base: STRIPE_API_BASE.to_string(),
        })
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Start an authenticated request against an API path.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, self.endpoint(path))
    }

    /// Absolute URL for an API path such as `checkout/sessions`.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path.trim_start_matches('/'))
    }
}

impl fmt::Debug for PaymentClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaymentClient")
            .field("api_base", &self.api_base)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}
