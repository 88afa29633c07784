//! Copilot gateway — credential-translating reverse proxy.
//!
//! Exposes an OpenAI-compatible surface (chat completions, embeddings,
//! models) and internally exchanges a long-lived GitHub credential for a
//! short-lived Copilot access token before forwarding each request.

pub mod api;
pub mod auth;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod errors;
pub mod headers;
pub mod proxy;

use auth::broker::TokenBroker;
use auth::device::DeviceFlow;
use config::Config;
use headers::EditorIdentity;
use proxy::upstream::UpstreamClient;

/// Shared application state passed to handlers.
///
/// All mutable state lives behind the broker's token cache; everything else
/// here is configuration and connection pooling, constructed once at startup.
pub struct AppState {
    pub config: Config,
    pub broker: TokenBroker,
    pub device: DeviceFlow,
    pub upstream: UpstreamClient,
    pub identity: EditorIdentity,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let upstream = UpstreamClient::new();
        let broker = TokenBroker::new(upstream.inner(), config.endpoints.token_url.clone());
        let device = DeviceFlow::new(
            upstream.inner(),
            config.client_id.clone(),
            config.endpoints.device_code_url.clone(),
            config.endpoints.device_token_url.clone(),
        );
        Self {
            config,
            broker,
            device,
            upstream,
            identity: EditorIdentity::default(),
        }
    }
}
