//! Google OAuth consent redirect
//!
//! The browser is sent to Google's authorization endpoint and comes back
//! with a code. The code is exchanged for a Google ID token, which the
//! identity provider accepts through `signInWithIdp`.

use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use std::time::Duration;

use super::IdentityError;
use crate::config::GoogleConfig;

/// OAuth authorization-code flow against Google
#[async_trait]
pub trait GoogleOAuth: Send + Sync {
    /// URL of the consent screen; Google sends the browser back to
    /// `redirect_uri` with `code` and `state`
    fn authorize_url(&self, redirect_uri: &str, state: &str) -> String;

    /// Trade an authorization code for a Google ID token
    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<String, IdentityError>;
}

pub struct GoogleOAuthClient {
    client: reqwest::Client,
    config: GoogleConfig,
}

#[derive(Deserialize)]
struct CodeExchangeResponse {
    #[serde(default)]
    id_token: Option<String>,
}

#[derive(Deserialize)]
struct OAuthErrorResponse {
    error: String,
}

impl GoogleOAuthClient {
    pub fn new(config: &GoogleConfig, timeout_secs: u64) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self::with_client(client, config.clone()))
    }

    pub fn with_client(client: reqwest::Client, config: GoogleConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl GoogleOAuth for GoogleOAuthClient {
    fn authorize_url(&self, redirect_uri: &str, state: &str) -> String {
        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("redirect_uri", redirect_uri),
            ("response_type", "code"),
            ("scope", "openid email profile"),
            ("state", state),
            ("prompt", "select_account"),
        ];
        match Url::parse_with_params(&self.config.auth_url, &params) {
            Ok(url) => url.to_string(),
            Err(e) => {
                tracing::error!(auth_url = %self.config.auth_url, "Invalid Google auth URL: {}", e);
                self.config.auth_url.clone()
            }
        }
    }

    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<String, IdentityError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("redirect_uri", redirect_uri),
        ];
        let response = self
            .client
            .post(&self.config.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Google token endpoint unreachable: {}", e);
                IdentityError::Network(e.to_string())
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| IdentityError::Network(e.to_string()))?;

        if !status.is_success() {
            let code = serde_json::from_str::<OAuthErrorResponse>(&text)
                .map(|e| e.error)
                .unwrap_or_else(|_| format!("HTTP_{}", status.as_u16()));
            tracing::warn!(status = status.as_u16(), code = %code, "Google rejected code exchange");
            return Err(IdentityError::Provider(code));
        }

        serde_json::from_str::<CodeExchangeResponse>(&text)
            .ok()
            .and_then(|r| r.id_token)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| IdentityError::Provider("MISSING_ID_TOKEN".to_string()))
    }
}
