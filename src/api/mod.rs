//! Router assembly and the non-proxy surface: help page, model catalog,
//! and the device-login pages.

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, State};
use axum::response::Html;
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::device::DevicePoll;
use crate::catalog::{self, ModelList};
use crate::errors::AppError;
use crate::proxy;
use crate::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(help))
        .route("/v1/models", get(models))
        .route("/v1/chat/completions", post(proxy::handler::chat_completions))
        .route("/v1/embeddings", post(proxy::handler::embeddings))
        .route("/auth", get(auth_page))
        .route("/auth/check", post(auth_check))
        .with_state(state)
        .layer(DefaultBodyLimit::max(25 * 1024 * 1024))
        .layer(TraceLayer::new_for_http())
        // The gateway is meant to sit behind arbitrary chat clients, so CORS
        // is wide open (original behavior).
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

async fn help() -> &'static str {
    r#"
curl --location 'http://127.0.0.1:8081/v1/chat/completions' \
--header 'Content-Type: application/json' \
--header 'Authorization: Bearer ghu_xxx' \
--data '{
  "model": "gpt-4",
  "messages": [{"role": "user", "content": "hi"}]
}'"#
}

async fn models() -> Json<ModelList> {
    Json(catalog::model_list())
}

/// Device-login page: requests a device code and renders a page that shows
/// the user code and polls /auth/check every 6 seconds for up to 15 minutes
/// (the same schedule `DeviceFlow::wait_for_credential` uses server-side).
async fn auth_page(State(state): State<Arc<AppState>>) -> Result<Html<String>, AppError> {
    let authz = state.device.request_device_code().await?;
    tracing::info!(user_code = %authz.user_code, "device authorization started");

    let page = AUTH_PAGE
        .replace("{{USER_CODE}}", &authz.user_code)
        .replace("{{DEVICE_CODE}}", &authz.device_code);
    Ok(Html(page))
}

#[derive(Debug, Deserialize)]
struct AuthCheckRequest {
    device_code: String,
}

#[derive(Debug, Serialize)]
struct AuthCheckResponse {
    code: &'static str,
    msg: String,
    data: String,
}

impl AuthCheckResponse {
    fn pending(msg: impl Into<String>) -> Self {
        Self {
            code: "1",
            msg: msg.into(),
            data: String::new(),
        }
    }
}

/// One poll of the device grant. Always answers 200; the `code` field tells
/// the page whether to keep polling ("1") or stop ("0" = credential ready).
async fn auth_check(
    State(state): State<Arc<AppState>>,
    Form(req): Form<AuthCheckRequest>,
) -> Json<AuthCheckResponse> {
    if req.device_code.is_empty() {
        return Json(AuthCheckResponse::pending("device code null"));
    }

    let resp = match state.device.poll_once(&req.device_code).await {
        Ok(DevicePoll::Authorized { credential }) => AuthCheckResponse {
            code: "0",
            msg: "success".into(),
            data: credential,
        },
        Ok(DevicePoll::Pending) => AuthCheckResponse::pending("authorization_pending"),
        Ok(DevicePoll::SlowDown { .. }) => AuthCheckResponse::pending("slow_down"),
        Ok(DevicePoll::Expired) => AuthCheckResponse::pending("expired_token"),
        Ok(DevicePoll::Denied) => AuthCheckResponse::pending("access_denied"),
        Err(e) => AuthCheckResponse::pending(e.to_string()),
    };
    Json(resp)
}

const AUTH_PAGE: &str = r#"<!doctype html>
<html>
<h1>Device login</h1>
<p>Open <a href="https://github.com/login/device" target="_blank">https://github.com/login/device</a>
and enter the code below. Keep this page open; the credential appears here once
authorization completes.</p>
<p>Code: <input type="text" value="{{USER_CODE}}" disabled id="code" size="10"></p>
<p>Credential: <input type="text" value="waiting..." id="credential" size="50"></p>
<script>
    var deviceCode = "{{DEVICE_CODE}}";
    var intervalId = null;

    function poll() {
        var body = new URLSearchParams();
        body.append("device_code", deviceCode);
        fetch("/auth/check", { method: "POST", body: body })
            .then(function (resp) { return resp.json(); })
            .then(function (data) {
                if (data.code === "0") {
                    clearInterval(intervalId);
                    document.getElementById("credential").value = data.data;
                }
            })
            .catch(function (err) { console.error("poll failed", err); });
    }

    intervalId = setInterval(poll, 6 * 1000);
    setTimeout(function () { clearInterval(intervalId); }, 15 * 60 * 1000);
</script>
</html>"#;
