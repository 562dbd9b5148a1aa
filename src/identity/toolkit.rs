//! Identity Toolkit v1 REST client
//!
//! Account calls go to `accounts:*`; ID token renewal goes to the secure
//! token service, which answers in snake_case.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

use super::{
    AccountInfo, AuthTokens, IdentityError, IdentityProvider, RefreshedTokens, DEFAULT_TOKEN_LIFETIME_SECS,
};
use crate::config::IdentityConfig;

/// Client for `accounts:*` endpoints, authenticated with the project API key
pub struct IdentityToolkitClient {
    client: reqwest::Client,
    endpoint: String,
    token_endpoint: String,
    api_key: String,
}

fn lifetime(expires_in: Option<&str>) -> u64 {
    expires_in
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    local_id: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    display_name: Option<String>,
    id_token: String,
    #[serde(default)]
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<String>,
}

impl From<TokenResponse> for AuthTokens {
    fn from(r: TokenResponse) -> Self {
        AuthTokens {
            uid: r.local_id,
            email: r.email,
            display_name: r.display_name.filter(|n| !n.is_empty()),
            id_token: r.id_token,
            refresh_token: r.refresh_token,
            expires_in: lifetime(r.expires_in.as_deref()),
        }
    }
}

/// `accounts:signInWithIdp` answer; `needConfirmation` flags an email that
/// is already registered with another sign-in method
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdpResponse {
    #[serde(default)]
    need_confirmation: bool,
    #[serde(default)]
    local_id: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    id_token: String,
    #[serde(default)]
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<String>,
}

#[derive(Deserialize)]
struct RefreshResponse {
    id_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<String>,
}

#[derive(Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupUser {
    local_id: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    email_verified: bool,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    photo_url: Option<String>,
}

#[derive(Deserialize)]
struct EmailResponse {
    #[serde(default)]
    email: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

impl IdentityToolkitClient {
    pub fn new(config: &IdentityConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self::with_client(client, &config.endpoint, &config.api_key)
            .with_token_endpoint(&config.token_endpoint))
    }

    pub fn with_client(client: reqwest::Client, endpoint: &str, api_key: &str) -> Self {
        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            token_endpoint: "https://securetoken.googleapis.com/v1".to_string(),
            api_key: api_key.to_string(),
        }
    }

    pub fn with_token_endpoint(mut self, token_endpoint: &str) -> Self {
        self.token_endpoint = token_endpoint.trim_end_matches('/').to_string();
        self
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, body: Value) -> Result<T, IdentityError> {
        let url = format!("{}/accounts:{}", self.endpoint, method);
        let request = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body);
        self.send(method, request).await
    }

    async fn send<T: DeserializeOwned>(&self, method: &str, request: reqwest::RequestBuilder) -> Result<T, IdentityError> {
        let response = request
            .send()
            .await
            .map_err(|e| {
                tracing::error!(method, "Identity provider unreachable: {}", e);
                IdentityError::Network(e.to_string())
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| IdentityError::Network(e.to_string()))?;

        if !status.is_success() {
            let code = serde_json::from_str::<ErrorEnvelope>(&text)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| format!("HTTP_{}", status.as_u16()));
            tracing::warn!(method, status = status.as_u16(), code = %code, "Identity provider rejected request");
            return Err(IdentityError::from_code(&code));
        }

        serde_json::from_str(&text).map_err(|e| {
            tracing::error!(method, "Invalid identity provider response: {}", e);
            IdentityError::Provider("INVALID_RESPONSE".to_string())
        })
    }
}

#[async_trait]
impl IdentityProvider for IdentityToolkitClient {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<AuthTokens, IdentityError> {
        let body = json!({ "email": email, "password": password, "returnSecureToken": true });
        let response: TokenResponse = self.call("signInWithPassword", body).await?;
        Ok(response.into())
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthTokens, IdentityError> {
        let body = json!({ "email": email, "password": password, "returnSecureToken": true });
        let response: TokenResponse = self.call("signUp", body).await?;
        Ok(response.into())
    }

    async fn update_display_name(&self, id_token: &str, display_name: &str) -> Result<(), IdentityError> {
        let body = json!({ "idToken": id_token, "displayName": display_name, "returnSecureToken": false });
        let _: Value = self.call("update", body).await?;
        Ok(())
    }

    async fn lookup(&self, id_token: &str) -> Result<AccountInfo, IdentityError> {
        let response: LookupResponse = self.call("lookup", json!({ "idToken": id_token })).await?;
        let user = response
            .users
            .into_iter()
            .next()
            .ok_or_else(|| IdentityError::Provider("USER_NOT_FOUND".to_string()))?;
        Ok(AccountInfo {
            uid: user.local_id,
            email: user.email,
            email_verified: user.email_verified,
            display_name: user.display_name.filter(|n| !n.is_empty()),
            photo_url: user.photo_url.filter(|p| !p.is_empty()),
        })
    }

    async fn send_email_verification(&self, id_token: &str, continue_url: &str) -> Result<(), IdentityError> {
        let body = json!({ "requestType": "VERIFY_EMAIL", "idToken": id_token, "continueUrl": continue_url });
        let _: Value = self.call("sendOobCode", body).await?;
        Ok(())
    }

    async fn send_password_reset(&self, email: &str, continue_url: &str) -> Result<(), IdentityError> {
        let body = json!({ "requestType": "PASSWORD_RESET", "email": email, "continueUrl": continue_url });
        let _: Value = self.call("sendOobCode", body).await?;
        Ok(())
    }

    async fn verify_password_reset_code(&self, oob_code: &str) -> Result<String, IdentityError> {
        let response: EmailResponse = self.call("resetPassword", json!({ "oobCode": oob_code })).await?;
        Ok(response.email)
    }

    async fn confirm_password_reset(&self, oob_code: &str, new_password: &str) -> Result<(), IdentityError> {
        let body = json!({ "oobCode": oob_code, "newPassword": new_password });
        let _: Value = self.call("resetPassword", body).await?;
        Ok(())
    }

    async fn apply_action_code(&self, oob_code: &str) -> Result<(), IdentityError> {
        let _: Value = self.call("update", json!({ "oobCode": oob_code })).await?;
        Ok(())
    }

    async fn refresh_id_token(&self, refresh_token: &str) -> Result<RefreshedTokens, IdentityError> {
        let url = format!("{}/token", self.token_endpoint);
        let request = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .form(&[("grant_type", "refresh_token"), ("refresh_token", refresh_token)]);
        let response: RefreshResponse = self.send("token", request).await?;
        Ok(RefreshedTokens {
            id_token: response.id_token,
            refresh_token: response.refresh_token,
            expires_in: lifetime(response.expires_in.as_deref()),
        })
    }

    async fn sign_in_with_google(&self, google_id_token: &str, request_uri: &str) -> Result<AuthTokens, IdentityError> {
        let body = json!({
            "postBody": format!("id_token={}&providerId=google.com", urlencoding::encode(google_id_token)),
            "requestUri": request_uri,
            "returnSecureToken": true,
            "returnIdpCredential": true
        });
        let response: IdpResponse = self.call("signInWithIdp", body).await?;
        if response.need_confirmation {
            return Err(IdentityError::AccountExistsWithDifferentCredential);
        }
        if response.id_token.is_empty() {
            return Err(IdentityError::Provider("INVALID_RESPONSE".to_string()));
        }
        Ok(AuthTokens {
            uid: response.local_id,
            email: response.email,
            display_name: response.display_name.filter(|n| !n.is_empty()),
            id_token: response.id_token,
            refresh_token: response.refresh_token,
            expires_in: lifetime(response.expires_in.as_deref()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn client(server: &MockServer) -> IdentityToolkitClient {
        IdentityToolkitClient::with_client(reqwest::Client::new(), &server.url("/v1"), "test-key")
    }

    #[tokio::test]
    async fn test_sign_in_with_password() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/accounts:signInWithPassword")
                    .query_param("key", "test-key")
                    .json_body(json!({
                        "email": "jane@example.com",
                        "password": "secret123",
                        "returnSecureToken": true
                    }));
                then.status(200).json_body(json!({
                    "localId": "uid-1",
                    "email": "jane@example.com",
                    "displayName": "",
                    "idToken": "id-tok",
                    "refreshToken": "ref-tok",
                    "expiresIn": "3600",
                    "registered": true
                }));
            })
            .await;

        let tokens = client(&server)
            .sign_in_with_password("jane@example.com", "secret123")
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(tokens.uid, "uid-1");
        assert_eq!(tokens.id_token, "id-tok");
        assert_eq!(tokens.display_name, None);
        assert_eq!(tokens.expires_in, 3600);
    }

    #[tokio::test]
    async fn test_refresh_id_token() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/st/token")
                    .query_param("key", "test-key")
                    .header("content-type", "application/x-www-form-urlencoded")
                    .body("grant_type=refresh_token&refresh_token=ref-tok");
                then.status(200).json_body(json!({
                    "id_token": "id-tok-2",
                    "refresh_token": "ref-tok-2",
                    "expires_in": "1800",
                    "token_type": "Bearer",
                    "user_id": "uid-1"
                }));
            })
            .await;

        let refreshed = client(&server)
            .with_token_endpoint(&server.url("/st"))
            .refresh_id_token("ref-tok")
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(refreshed.id_token, "id-tok-2");
        assert_eq!(refreshed.refresh_token, "ref-tok-2");
        assert_eq!(refreshed.expires_in, 1800);
    }

    #[tokio::test]
    async fn test_refresh_rejected() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/st/token");
                then.status(400).json_body(json!({ "error": { "code": 400, "message": "TOKEN_EXPIRED" } }));
            })
            .await;

        let err = client(&server)
            .with_token_endpoint(&server.url("/st"))
            .refresh_id_token("old")
            .await
            .unwrap_err();
        assert_eq!(err, IdentityError::TokenExpired);
    }

    #[tokio::test]
    async fn test_lookup_with_expired_token() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/accounts:lookup");
                then.status(400).json_body(json!({ "error": { "code": 400, "message": "INVALID_ID_TOKEN" } }));
            })
            .await;

        assert_eq!(client(&server).lookup("stale").await.unwrap_err(), IdentityError::TokenExpired);
    }

    #[tokio::test]
    async fn test_sign_in_with_google() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/accounts:signInWithIdp").json_body(json!({
                    "postBody": "id_token=g-tok&providerId=google.com",
                    "requestUri": "http://localhost/auth/google/callback",
                    "returnSecureToken": true,
                    "returnIdpCredential": true
                }));
                then.status(200).json_body(json!({
                    "federatedId": "https://accounts.google.com/123",
                    "providerId": "google.com",
                    "localId": "uid-g",
                    "email": "jane@gmail.com",
                    "emailVerified": true,
                    "displayName": "Jane G",
                    "idToken": "id-g",
                    "refreshToken": "ref-g",
                    "expiresIn": "3600"
                }));
            })
            .await;

        let tokens = client(&server)
            .sign_in_with_google("g-tok", "http://localhost/auth/google/callback")
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(tokens.uid, "uid-g");
        assert_eq!(tokens.display_name.as_deref(), Some("Jane G"));
        assert_eq!(tokens.refresh_token, "ref-g");
    }

    #[tokio::test]
    async fn test_google_account_needs_confirmation() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/accounts:signInWithIdp");
                then.status(200).json_body(json!({
                    "needConfirmation": true,
                    "email": "jane@example.com",
                    "providerId": "google.com"
                }));
            })
            .await;

        let err = client(&server)
            .sign_in_with_google("g-tok", "http://localhost/auth/google/callback")
            .await
            .unwrap_err();
        assert_eq!(err, IdentityError::AccountExistsWithDifferentCredential);
    }

    #[tokio::test]
    async fn test_sign_in_invalid_credentials() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/accounts:signInWithPassword");
                then.status(400).json_body(json!({
                    "error": { "code": 400, "message": "INVALID_LOGIN_CREDENTIALS", "errors": [] }
                }));
            })
            .await;

        let err = client(&server).sign_in_with_password("a@b.co", "x").await.unwrap_err();
        assert_eq!(err, IdentityError::InvalidCredentials);
    }

    #[tokio::test]
    async fn test_sign_up_email_exists() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/accounts:signUp");
                then.status(400).json_body(json!({ "error": { "code": 400, "message": "EMAIL_EXISTS" } }));
            })
            .await;

        let err = client(&server).sign_up("a@b.co", "password1").await.unwrap_err();
        assert_eq!(err, IdentityError::EmailExists);
    }

    #[tokio::test]
    async fn test_lookup_reads_first_user() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/accounts:lookup")
                    .json_body(json!({ "idToken": "id-tok" }));
                then.status(200).json_body(json!({
                    "users": [{
                        "localId": "uid-1",
                        "email": "jane@example.com",
                        "emailVerified": true,
                        "displayName": "Jane",
                        "photoUrl": "https://img/jane.png"
                    }]
                }));
            })
            .await;

        let info = client(&server).lookup("id-tok").await.unwrap();
        assert!(info.email_verified);
        assert_eq!(info.display_name.as_deref(), Some("Jane"));
        assert_eq!(info.photo_url.as_deref(), Some("https://img/jane.png"));
    }

    #[tokio::test]
    async fn test_lookup_without_users() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/accounts:lookup");
                then.status(200).json_body(json!({}));
            })
            .await;

        assert!(client(&server).lookup("id-tok").await.is_err());
    }

    #[tokio::test]
    async fn test_send_oob_codes() {
        let server = MockServer::start_async().await;
        let verify = server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/accounts:sendOobCode").json_body(json!({
                    "requestType": "VERIFY_EMAIL",
                    "idToken": "id-tok",
                    "continueUrl": "http://localhost/action"
                }));
                then.status(200).json_body(json!({ "email": "jane@example.com" }));
            })
            .await;
        let reset = server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/accounts:sendOobCode").json_body(json!({
                    "requestType": "PASSWORD_RESET",
                    "email": "jane@example.com",
                    "continueUrl": "http://localhost/login"
                }));
                then.status(200).json_body(json!({ "email": "jane@example.com" }));
            })
            .await;

        let c = client(&server);
        c.send_email_verification("id-tok", "http://localhost/action").await.unwrap();
        c.send_password_reset("jane@example.com", "http://localhost/login").await.unwrap();

        verify.assert_async().await;
        reset.assert_async().await;
    }

    #[tokio::test]
    async fn test_reset_password_flow() {
        let server = MockServer::start_async().await;
        let confirm = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/accounts:resetPassword")
                    .json_body(json!({ "oobCode": "code-1", "newPassword": "newpass123" }));
                then.status(200).json_body(json!({ "email": "jane@example.com" }));
            })
            .await;
        let verify = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/accounts:resetPassword")
                    .json_body(json!({ "oobCode": "code-1" }));
                then.status(200).json_body(json!({ "email": "jane@example.com", "requestType": "PASSWORD_RESET" }));
            })
            .await;

        let c = client(&server);
        assert_eq!(c.verify_password_reset_code("code-1").await.unwrap(), "jane@example.com");
        c.confirm_password_reset("code-1", "newpass123").await.unwrap();

        verify.assert_async().await;
        confirm.assert_async().await;
    }

    #[tokio::test]
    async fn test_apply_action_code_expired() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/accounts:update")
                    .json_body(json!({ "oobCode": "old" }));
                then.status(400).json_body(json!({ "error": { "message": "EXPIRED_OOB_CODE" } }));
            })
            .await;

        let err = client(&server).apply_action_code("old").await.unwrap_err();
        assert_eq!(err, IdentityError::ExpiredActionCode);
    }

    #[tokio::test]
    async fn test_non_json_error_body() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/accounts:update");
                then.status(503).body("Service Unavailable");
            })
            .await;

        let err = client(&server).update_display_name("id-tok", "Jane").await.unwrap_err();
        assert_eq!(err, IdentityError::Provider("HTTP_503".to_string()));
    }

    #[tokio::test]
    async fn test_unreachable_provider() {
        let c = IdentityToolkitClient::with_client(reqwest::Client::new(), "http://127.0.0.1:1/v1", "k");
        let err = c.lookup("id-tok").await.unwrap_err();
        assert!(matches!(err, IdentityError::Network(_)));
    }
}
