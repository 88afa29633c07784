use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::auth::broker::TokenError;
use crate::auth::device::DeviceError;

/// Clamp a response body for log output so a large upstream error does not
/// flood the logs.
pub fn log_snippet(body: &str) -> &str {
    const MAX: usize = 512;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("request body is missing or not in JSON format")]
    MissingBody,

    #[error("auth token not found")]
    MissingCredential,

    #[error("auth token has unexpected format")]
    MalformedCredential,

    #[error("auth token is invalid")]
    CredentialRejected,

    #[error("token exchange failed: {0}")]
    TokenExchange(#[from] TokenError),

    #[error("device flow failed: {0}")]
    DeviceFlow(#[from] DeviceError),

    /// Non-200 from the completions/embeddings upstream. Status and body are
    /// relayed to the client verbatim.
    #[error("upstream returned {status}")]
    UpstreamStatus { status: StatusCode, body: String },

    #[error("upstream request failed: {0}")]
    Upstream(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, code, msg) = match &self {
            AppError::MissingBody => (
                StatusCode::BAD_REQUEST,
                "invalid_request_error",
                "missing_body",
                self.to_string(),
            ),
            AppError::MissingCredential => (
                StatusCode::BAD_REQUEST,
                "authentication_error",
                "credential_missing",
                self.to_string(),
            ),
            AppError::MalformedCredential => (
                StatusCode::BAD_REQUEST,
                "authentication_error",
                "credential_malformed",
                self.to_string(),
            ),
            AppError::CredentialRejected => (
                StatusCode::BAD_REQUEST,
                "authentication_error",
                "credential_rejected",
                self.to_string(),
            ),
            AppError::TokenExchange(e) => (
                StatusCode::BAD_REQUEST,
                "authentication_error",
                "token_exchange_failed",
                e.to_string(),
            ),
            AppError::DeviceFlow(e) => (
                StatusCode::BAD_REQUEST,
                "authentication_error",
                "device_flow_failed",
                e.to_string(),
            ),
            AppError::UpstreamStatus { status, body } => {
                // Relay the upstream error verbatim instead of wrapping it.
                return (
                    *status,
                    [(axum::http::header::CONTENT_TYPE, "application/json; charset=utf-8")],
                    body.clone(),
                )
                    .into_response();
            }
            AppError::Upstream(e) => {
                tracing::error!("Upstream transport error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "upstream_unreachable",
                    e.clone(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal_server_error",
                    "internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "message": msg,
                "type": error_type,
                "code": code,
            }
        }));

        (status, body).into_response()
    }
}
