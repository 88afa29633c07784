/// HTTP client for forwarding requests to the upstream API.
///
/// No retry layer: a single upstream failure is terminal for that request.
/// No total-request timeout either; streamed chat responses can run for
/// minutes, so only connection establishment is bounded.
use std::time::Duration;

use axum::http::HeaderMap;
use bytes::Bytes;

use crate::errors::AppError;

#[derive(Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
}

impl UpstreamClient {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .pool_max_idle_per_host(32)
            .connect_timeout(Duration::from_secs(5))
            .build()
            .expect("failed to build HTTP client");

        Self { client }
    }

    /// The underlying client, for components that should share the
    /// connection pool (token broker, device flow, identity check).
    pub fn inner(&self) -> reqwest::Client {
        self.client.clone()
    }

    pub async fn post(
        &self,
        url: &str,
        headers: HeaderMap,
        body: Bytes,
    ) -> Result<reqwest::Response, AppError> {
        self.client
            .post(url)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!("Upstream request failed: {}", e);
                AppError::Upstream(e.to_string())
            })
    }
}

impl Default for UpstreamClient {
    fn default() -> Self {
        Self::new()
    }
}
