use serde::Deserialize;

/// Upstream endpoints the gateway talks to. Defaults target the production
/// GitHub/Copilot hosts; every URL can be overridden through the environment
/// so tests can point the gateway at a mock server.
#[derive(Debug, Clone, Deserialize)]
pub struct Endpoints {
    /// Token-exchange endpoint (credential -> short-lived access token).
    pub token_url: String,
    pub completions_url: String,
    pub embeddings_url: String,
    /// Identity-check endpoint used to pre-validate a credential.
    pub identity_url: String,
    /// Device-authorization endpoint (returns device_code/user_code).
    pub device_code_url: String,
    /// Device-grant exchange endpoint (device_code -> credential).
    pub device_token_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    /// OAuth client id for the device flow. Unset disables /auth.
    pub client_id: Option<String>,
    /// Pre-provisioned credential, if the operator already has one.
    pub default_credential: Option<String>,
    /// Required prefix on inbound credentials (e.g. "gh" for ghu_/gho_ tokens).
    pub credential_prefix: String,
    /// Whether to verify credentials against the identity endpoint before
    /// forwarding. Costs one GET per request.
    pub verify_credential: bool,
    pub endpoints: Endpoints,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.into())
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();

    Ok(Config {
        port: std::env::var("PORT")
            .unwrap_or_else(|_| "8081".into())
            .parse()
            .unwrap_or(8081),
        client_id: std::env::var("CLIENT_ID").ok().filter(|s| !s.is_empty()),
        default_credential: std::env::var("GITHUB_TOKEN").ok().filter(|s| !s.is_empty()),
        credential_prefix: env_or("CREDENTIAL_PREFIX", "gh"),
        verify_credential: std::env::var("VERIFY_CREDENTIAL")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(true),
        endpoints: Endpoints {
            token_url: env_or("TOKEN_URL", "https://api.github.com/copilot_internal/v2/token"),
            completions_url: env_or(
                "COMPLETIONS_URL",
                "https://api.githubcopilot.com/chat/completions",
            ),
            embeddings_url: env_or("EMBEDDINGS_URL", "https://api.githubcopilot.com/embeddings"),
            identity_url: env_or("IDENTITY_URL", "https://api.github.com/user"),
            device_code_url: env_or("DEVICE_CODE_URL", "https://github.com/login/device/code"),
            device_token_url: env_or(
                "DEVICE_TOKEN_URL",
                "https://github.com/login/oauth/access_token",
            ),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_default_to_production_hosts() {
        // Only assert on vars the test environment is unlikely to set.
        let cfg = load().unwrap();
        assert!(cfg.endpoints.token_url.contains("copilot_internal"));
        assert_eq!(cfg.credential_prefix, "gh");
    }
}
