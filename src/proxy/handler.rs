//! Request forwarder: validates the inbound request, translates the
//! credential into an access token, and dispatches the payload upstream.

use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::Response;

use crate::errors::{log_snippet, AppError};
use crate::headers::CorrelationIds;
use crate::proxy::stream;
use crate::AppState;

pub async fn chat_completions(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let url = state.config.endpoints.completions_url.clone();
    forward(state, &url, &headers, body).await
}

pub async fn embeddings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let url = state.config.endpoints.embeddings_url.clone();
    forward(state, &url, &headers, body).await
}

#[tracing::instrument(skip_all, fields(url = %url))]
async fn forward(
    state: Arc<AppState>,
    url: &str,
    headers: &HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    // The body is forwarded verbatim; parsing only validates it is JSON and
    // reads the stream flag.
    let json: serde_json::Value =
        serde_json::from_slice(&body).map_err(|_| AppError::MissingBody)?;
    let is_stream = json
        .get("stream")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);

    let credential = extract_bearer(headers)?;
    if !credential.starts_with(&state.config.credential_prefix) {
        tracing::warn!("credential rejected: unexpected prefix");
        return Err(AppError::MalformedCredential);
    }
    if state.config.verify_credential && !verify_credential(&state, &credential).await {
        tracing::warn!("credential rejected by identity endpoint");
        return Err(AppError::CredentialRejected);
    }

    let access_token = state.broker.access_token(&credential).await?;

    let ids = CorrelationIds::generate();
    let upstream_headers = state.identity.completion_headers(&access_token, &ids);

    let resp = state.upstream.post(url, upstream_headers, body).await?;
    let status = resp.status();

    if status != reqwest::StatusCode::OK {
        let body = resp
            .text()
            .await
            .map_err(|e| AppError::Upstream(e.to_string()))?;
        tracing::error!(
            status = status.as_u16(),
            body = log_snippet(&body),
            "upstream rejected request"
        );
        // The token upstream just refused is not worth keeping; force a
        // fresh exchange on the next call.
        state.broker.invalidate(&credential);
        return Err(AppError::UpstreamStatus {
            status: StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY),
            body,
        });
    }

    if is_stream {
        Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "text/event-stream; charset=utf-8")
            .header(header::CACHE_CONTROL, "no-cache, must-revalidate")
            .body(stream::relay(resp))
            .map_err(|e| AppError::Internal(anyhow::Error::new(e)))
    } else {
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| AppError::Upstream(e.to_string()))?;
        Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "application/json; charset=utf-8")
            .body(Body::from(bytes))
            .map_err(|e| AppError::Internal(anyhow::Error::new(e)))
    }
}

fn extract_bearer(headers: &HeaderMap) -> Result<String, AppError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::MissingCredential)?;
    match value.split_once(' ') {
        Some(("Bearer", token)) if !token.is_empty() => Ok(token.to_string()),
        _ => Err(AppError::MissingCredential),
    }
}

/// Cheap pre-check of the credential against the identity endpoint. Any
/// non-200 answer (or transport failure) invalidates the credential for
/// this call only.
async fn verify_credential(state: &AppState, credential: &str) -> bool {
    let result = state
        .upstream
        .inner()
        .get(&state.config.endpoints.identity_url)
        .headers(state.identity.identity_headers(credential))
        .send()
        .await;
    match result {
        Ok(resp) => resp.status() == reqwest::StatusCode::OK,
        Err(e) => {
            tracing::warn!("identity check failed: {}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_map(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, value.parse().unwrap());
        headers
    }

    #[test]
    fn bearer_credential_is_extracted() {
        let headers = header_map("Bearer ghu_abc123");
        assert_eq!(extract_bearer(&headers).unwrap(), "ghu_abc123");
    }

    #[test]
    fn missing_authorization_header_is_a_client_error() {
        let headers = HeaderMap::new();
        assert!(matches!(
            extract_bearer(&headers),
            Err(AppError::MissingCredential)
        ));
    }

    #[test]
    fn non_bearer_scheme_is_rejected() {
        let headers = header_map("Basic dXNlcjpwYXNz");
        assert!(matches!(
            extract_bearer(&headers),
            Err(AppError::MissingCredential)
        ));
    }

    #[test]
    fn empty_bearer_token_is_rejected() {
        let headers = header_map("Bearer ");
        assert!(matches!(
            extract_bearer(&headers),
            Err(AppError::MissingCredential)
        ));
    }
}
