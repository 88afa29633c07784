//! Token broker: exchanges a long-lived credential for a short-lived
//! Copilot access token, with a TTL cache to avoid redundant exchanges.

use std::io::Read;
use std::time::Duration;

use thiserror::Error;

use crate::cache::TokenCache;
use crate::errors::log_snippet;
use crate::headers::EditorIdentity;

/// Upstream tokens are valid for roughly 15 minutes; cache for strictly less
/// so the cache self-expires before the token does.
const ACCESS_TOKEN_TTL: Duration = Duration::from_secs(14 * 60);

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token exchange request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("token endpoint returned status {0}")]
    Status(u16),

    #[error("token endpoint body could not be decompressed")]
    Decompress(#[source] std::io::Error),

    #[error("token endpoint returned a malformed body")]
    MalformedBody,

    #[error("token missing from exchange response")]
    MissingToken,
}

/// Exchanges credentials for access tokens and owns the shared token cache.
///
/// Cloning shares the cache and the HTTP connection pool, so an
/// `invalidate` from any handle affects every subsequent lookup.
#[derive(Clone)]
pub struct TokenBroker {
    client: reqwest::Client,
    cache: TokenCache,
    identity: EditorIdentity,
    token_url: String,
}

impl TokenBroker {
    pub fn new(client: reqwest::Client, token_url: String) -> Self {
        Self {
            client,
            cache: TokenCache::new(),
            identity: EditorIdentity::default(),
            token_url,
        }
    }

    /// Returns a currently valid access token for `credential`.
    ///
    /// Cache hit: no network I/O. Miss or expired entry: one exchange call;
    /// a successful exchange writes exactly one cache entry, a failed one
    /// writes nothing.
    pub async fn access_token(&self, credential: &str) -> Result<String, TokenError> {
        if let Some(token) = self.cache.get(credential) {
            return Ok(token);
        }

        let resp = self
            .client
            .get(&self.token_url)
            .headers(self.identity.exchange_headers(credential))
            .send()
            .await?;

        let status = resp.status().as_u16();
        let encoding = resp
            .headers()
            .get(reqwest::header::CONTENT_ENCODING)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let raw = resp.bytes().await?;
        let body = decode_body(encoding.as_deref(), &raw)?;

        if status != 200 {
            tracing::warn!(
                status,
                body = log_snippet(&String::from_utf8_lossy(&body)),
                "token exchange rejected"
            );
            return Err(TokenError::Status(status));
        }

        let token = extract_token(&body)?;
        self.cache
            .insert(credential, token.clone(), ACCESS_TOKEN_TTL);
        Ok(token)
    }

    /// Drop the cached token for `credential` so the next call re-exchanges.
    /// Called by the forwarder when upstream rejects a request.
    pub fn invalidate(&self, credential: &str) {
        self.cache.invalidate(credential);
    }

    pub fn cache(&self) -> &TokenCache {
        &self.cache
    }
}

/// Pick a decoder based on the response's Content-Encoding. The exchange
/// endpoint gzips bodies when asked; everything else passes through raw.
fn decode_body(encoding: Option<&str>, raw: &[u8]) -> Result<Vec<u8>, TokenError> {
    match encoding {
        Some("gzip") => {
            let mut out = Vec::new();
            flate2::read::GzDecoder::new(raw)
                .read_to_end(&mut out)
                .map_err(TokenError::Decompress)?;
            Ok(out)
        }
        _ => Ok(raw.to_vec()),
    }
}

fn extract_token(body: &[u8]) -> Result<String, TokenError> {
    let json: serde_json::Value =
        serde_json::from_slice(body).map_err(|_| TokenError::MalformedBody)?;
    match json.get("token").and_then(|t| t.as_str()) {
        Some(token) if !token.is_empty() => Ok(token.to_string()),
        _ => Err(TokenError::MissingToken),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut enc = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    #[test]
    fn plain_body_passes_through() {
        let body = decode_body(None, b"{\"token\":\"abc\"}").unwrap();
        assert_eq!(body, b"{\"token\":\"abc\"}");
    }

    #[test]
    fn gzip_body_is_decompressed() {
        let compressed = gzip(b"{\"token\":\"abc\"}");
        let body = decode_body(Some("gzip"), &compressed).unwrap();
        assert_eq!(body, b"{\"token\":\"abc\"}");
    }

    #[test]
    fn truncated_gzip_is_a_decompress_error() {
        let mut compressed = gzip(b"{\"token\":\"abc\"}");
        compressed.truncate(compressed.len() / 2);
        assert!(matches!(
            decode_body(Some("gzip"), &compressed),
            Err(TokenError::Decompress(_))
        ));
    }

    #[test]
    fn garbage_with_gzip_header_is_a_decompress_error() {
        assert!(matches!(
            decode_body(Some("gzip"), b"definitely not gzip"),
            Err(TokenError::Decompress(_))
        ));
    }

    #[test]
    fn token_is_extracted_from_exchange_response() {
        let token = extract_token(b"{\"token\":\"tid=abc;exp=123\",\"expires_at\":123}").unwrap();
        assert_eq!(token, "tid=abc;exp=123");
    }

    #[test]
    fn missing_token_field_is_distinct_from_malformed_body() {
        assert!(matches!(
            extract_token(b"{\"expires_at\":123}"),
            Err(TokenError::MissingToken)
        ));
        assert!(matches!(
            extract_token(b"{\"token\":\"\"}"),
            Err(TokenError::MissingToken)
        ));
        assert!(matches!(
            extract_token(b"not json"),
            Err(TokenError::MalformedBody)
        ));
    }
}
