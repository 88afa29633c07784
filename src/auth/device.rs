//! Device-authorization-grant helper.
//!
//! Two-step flow: request a (device_code, user_code) pair, show the user
//! code to a human, then poll the grant endpoint until the user completes
//! authorization. The grant endpoint answers HTTP 200 even for "not yet" and
//! terminal failures, so outcomes are classified from the payload.

use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

/// How often to re-poll while authorization is pending.
pub const POLL_INTERVAL: Duration = Duration::from_secs(6);
/// Give up polling after this long; the device code is dead by then anyway.
pub const POLL_CEILING: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("device flow is not configured (set CLIENT_ID)")]
    NotConfigured,

    #[error("device flow request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("device endpoint returned status {0}")]
    Status(u16),

    #[error("device authorization response missing {0}")]
    MissingField(&'static str),

    #[error("device endpoint error: {0}")]
    Protocol(String),

    #[error("device authorization expired")]
    Expired,

    #[error("authorization denied by user")]
    Denied,
}

/// A pending device authorization. `user_code` is shown to the human;
/// `device_code` is the secret used to redeem the flow.
#[derive(Debug, Clone)]
pub struct DeviceAuthorization {
    pub device_code: String,
    pub user_code: String,
}

/// Outcome of a single poll against the grant endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DevicePoll {
    Pending,
    SlowDown { interval_secs: u64 },
    Authorized { credential: String },
    Denied,
    Expired,
}

#[derive(Clone)]
pub struct DeviceFlow {
    client: reqwest::Client,
    client_id: Option<String>,
    code_url: String,
    token_url: String,
}

impl DeviceFlow {
    pub fn new(
        client: reqwest::Client,
        client_id: Option<String>,
        code_url: String,
        token_url: String,
    ) -> Self {
        Self {
            client,
            client_id,
            code_url,
            token_url,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.client_id.is_some()
    }

    fn client_id(&self) -> Result<&str, DeviceError> {
        self.client_id.as_deref().ok_or(DeviceError::NotConfigured)
    }

    /// Initiate the flow. Fails if either returned field is empty.
    pub async fn request_device_code(&self) -> Result<DeviceAuthorization, DeviceError> {
        let resp = self
            .client
            .post(&self.code_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&[("client_id", self.client_id()?)])
            .send()
            .await?;

        let status = resp.status().as_u16();
        if status != 200 {
            return Err(DeviceError::Status(status));
        }
        let json: Value = resp.json().await?;

        let device_code = non_empty(&json, "device_code")
            .ok_or(DeviceError::MissingField("device_code"))?;
        let user_code =
            non_empty(&json, "user_code").ok_or(DeviceError::MissingField("user_code"))?;
        Ok(DeviceAuthorization {
            device_code,
            user_code,
        })
    }

    /// One poll of the grant endpoint. Returns `Pending` while the user has
    /// not completed authorization; the caller decides when to re-poll.
    pub async fn poll_once(&self, device_code: &str) -> Result<DevicePoll, DeviceError> {
        let resp = self
            .client
            .post(&self.token_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&[
                ("client_id", self.client_id()?),
                ("device_code", device_code),
                ("grant_type", "urn:ietf:params:oauth:grant-type:device_code"),
            ])
            .send()
            .await?;

        let status = resp.status().as_u16();
        if status != 200 {
            return Err(DeviceError::Status(status));
        }
        let json: Value = resp.json().await?;
        classify_poll(&json)
    }

    /// Poll on an interval until authorized, a terminal failure, or the
    /// ceiling elapses. Used by the `login` CLI command; the /auth page runs
    /// the same schedule in the browser.
    pub async fn wait_for_credential(&self, device_code: &str) -> Result<String, DeviceError> {
        self.wait_for_credential_with(device_code, POLL_INTERVAL, POLL_CEILING)
            .await
    }

    pub async fn wait_for_credential_with(
        &self,
        device_code: &str,
        mut interval: Duration,
        ceiling: Duration,
    ) -> Result<String, DeviceError> {
        let deadline = tokio::time::Instant::now() + ceiling;

        loop {
            match self.poll_once(device_code).await? {
                DevicePoll::Authorized { credential } => return Ok(credential),
                DevicePoll::Pending => {}
                DevicePoll::SlowDown { interval_secs } => {
                    interval = Duration::from_secs(interval_secs);
                }
                DevicePoll::Denied => return Err(DeviceError::Denied),
                DevicePoll::Expired => return Err(DeviceError::Expired),
            }
            if tokio::time::Instant::now() + interval > deadline {
                return Err(DeviceError::Expired);
            }
            tokio::time::sleep(interval).await;
        }
    }
}

fn non_empty(json: &Value, field: &str) -> Option<String> {
    json.get(field)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

/// Classify a 200 response from the grant endpoint. GitHub reports both
/// "still pending" and terminal failures in the body, not the status code.
fn classify_poll(json: &Value) -> Result<DevicePoll, DeviceError> {
    if let Some(credential) = non_empty(json, "access_token") {
        return Ok(DevicePoll::Authorized { credential });
    }
    match json.get("error").and_then(|e| e.as_str()) {
        Some("authorization_pending") => Ok(DevicePoll::Pending),
        Some("slow_down") => Ok(DevicePoll::SlowDown {
            interval_secs: json
                .get("interval")
                .and_then(|i| i.as_u64())
                .unwrap_or(POLL_INTERVAL.as_secs()),
        }),
        Some("expired_token") => Ok(DevicePoll::Expired),
        Some("access_denied") => Ok(DevicePoll::Denied),
        Some(other) => Err(DeviceError::Protocol(other.to_string())),
        None => Err(DeviceError::MissingField("access_token")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pending_payload_is_not_an_error() {
        let poll = classify_poll(&json!({"error": "authorization_pending"})).unwrap();
        assert_eq!(poll, DevicePoll::Pending);
    }

    #[test]
    fn slow_down_carries_the_new_interval() {
        let poll = classify_poll(&json!({"error": "slow_down", "interval": 11})).unwrap();
        assert_eq!(poll, DevicePoll::SlowDown { interval_secs: 11 });
    }

    #[test]
    fn completed_authorization_yields_the_credential() {
        let poll = classify_poll(&json!({"access_token": "ghu_secret"})).unwrap();
        assert_eq!(
            poll,
            DevicePoll::Authorized {
                credential: "ghu_secret".into()
            }
        );
    }

    #[test]
    fn terminal_failures_are_distinguished_from_pending() {
        assert_eq!(
            classify_poll(&json!({"error": "expired_token"})).unwrap(),
            DevicePoll::Expired
        );
        assert_eq!(
            classify_poll(&json!({"error": "access_denied"})).unwrap(),
            DevicePoll::Denied
        );
    }

    #[test]
    fn unknown_error_payload_is_a_protocol_error() {
        assert!(matches!(
            classify_poll(&json!({"error": "unsupported_grant_type"})),
            Err(DeviceError::Protocol(_))
        ));
    }

    #[test]
    fn empty_access_token_is_not_authorized() {
        assert!(matches!(
            classify_poll(&json!({"access_token": ""})),
            Err(DeviceError::MissingField("access_token"))
        ));
    }
}
