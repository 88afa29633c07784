//! Upstream header construction.
//!
//! The Copilot API expects requests to look like they came from an editor
//! plugin, so both the token exchange and the completions call carry a fixed
//! set of editor-identity headers plus per-request correlation identifiers.
//! Everything upstream-visible is enumerated here instead of being scattered
//! across handlers.

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Fixed editor identity presented to upstream.
#[derive(Debug, Clone)]
pub struct EditorIdentity {
    pub editor_version: &'static str,
    pub plugin_version: &'static str,
    pub user_agent: &'static str,
    /// API version sent on completions/embeddings calls.
    pub copilot_api_version: &'static str,
    /// API version sent on the identity-check call.
    pub github_api_version: &'static str,
    pub integration_id: &'static str,
}

impl Default for EditorIdentity {
    fn default() -> Self {
        Self {
            editor_version: "vscode/1.85.1",
            plugin_version: "copilot-chat/0.11.1",
            user_agent: "GitHubCopilotChat/0.11.1",
            copilot_api_version: "2023-07-07",
            github_api_version: "2022-11-28",
            integration_id: "vscode-chat",
        }
    }
}

/// Per-request correlation identifiers attached to upstream calls.
#[derive(Debug, Clone)]
pub struct CorrelationIds {
    pub request_id: String,
    /// Random id suffixed with a millisecond timestamp.
    pub session_id: String,
    /// Stable-looking machine identifier derived from a fresh random value.
    pub machine_id: String,
}

impl CorrelationIds {
    pub fn generate() -> Self {
        let session_id = format!(
            "{}{}",
            Uuid::new_v4(),
            chrono::Utc::now().timestamp_millis()
        );
        let machine_id = hex::encode(Sha256::digest(Uuid::new_v4().to_string().as_bytes()));
        Self {
            request_id: Uuid::new_v4().to_string(),
            session_id,
            machine_id,
        }
    }
}

fn put(headers: &mut HeaderMap, name: &'static str, value: &str) {
    if let Ok(v) = HeaderValue::from_str(value) {
        headers.insert(HeaderName::from_static(name), v);
    }
}

impl EditorIdentity {
    /// Headers for the credential -> access-token exchange. The exchange
    /// endpoint authenticates with `token <credential>` and may answer with
    /// a gzip body, hence the explicit Accept-Encoding.
    pub fn exchange_headers(&self, credential: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        put(&mut headers, "authorization", &format!("token {credential}"));
        put(&mut headers, "editor-version", self.editor_version);
        put(&mut headers, "editor-plugin-version", self.plugin_version);
        put(&mut headers, "user-agent", self.user_agent);
        put(&mut headers, "accept", "*/*");
        put(&mut headers, "accept-encoding", "gzip, deflate, br");
        headers
    }

    /// Headers for the forwarded completions/embeddings POST.
    pub fn completion_headers(&self, access_token: &str, ids: &CorrelationIds) -> HeaderMap {
        let mut headers = HeaderMap::new();
        put(&mut headers, "authorization", &format!("Bearer {access_token}"));
        put(&mut headers, "x-request-id", &ids.request_id);
        put(&mut headers, "x-github-api-version", self.copilot_api_version);
        put(&mut headers, "vscode-sessionid", &ids.session_id);
        put(&mut headers, "vscode-machineid", &ids.machine_id);
        put(&mut headers, "editor-version", self.editor_version);
        put(&mut headers, "editor-plugin-version", self.plugin_version);
        put(&mut headers, "openai-organization", "github-copilot");
        put(&mut headers, "openai-intent", "conversation-panel");
        put(&mut headers, "content-type", "application/json");
        put(&mut headers, "user-agent", self.user_agent);
        put(&mut headers, "copilot-integration-id", self.integration_id);
        put(&mut headers, "accept", "*/*");
        headers
    }

    /// Headers for the credential pre-check against the identity endpoint.
    pub fn identity_headers(&self, credential: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        put(&mut headers, "accept", "application/vnd.github+json");
        put(&mut headers, "authorization", &format!("Bearer {credential}"));
        put(&mut headers, "x-github-api-version", self.github_api_version);
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exchange_headers_carry_token_scheme() {
        let identity = EditorIdentity::default();
        let headers = identity.exchange_headers("ghu_abc");
        assert_eq!(headers["authorization"], "token ghu_abc");
        assert_eq!(headers["accept-encoding"], "gzip, deflate, br");
    }

    #[test]
    fn completion_headers_carry_correlation_ids() {
        let identity = EditorIdentity::default();
        let ids = CorrelationIds::generate();
        let headers = identity.completion_headers("tid=xyz", &ids);
        assert_eq!(headers["authorization"], "Bearer tid=xyz");
        assert_eq!(headers["x-request-id"], ids.request_id.as_str());
        assert_eq!(headers["vscode-sessionid"], ids.session_id.as_str());
        assert_eq!(headers["copilot-integration-id"], "vscode-chat");
    }

    #[test]
    fn machine_id_is_a_sha256_hex_digest() {
        let ids = CorrelationIds::generate();
        assert_eq!(ids.machine_id.len(), 64);
        assert!(ids.machine_id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn correlation_ids_are_unique_per_request() {
        let a = CorrelationIds::generate();
        let b = CorrelationIds::generate();
        assert_ne!(a.request_id, b.request_id);
        assert_ne!(a.machine_id, b.machine_id);
    }
}
