//! Identity provider
//!
//! Account credentials, email verification and password resets are owned by
//! an external identity service. [`IdentityProvider`] is the seam;
//! [`IdentityToolkitClient`] talks to the Identity Toolkit v1 REST API and
//! the secure token service. [`GoogleOAuth`] covers the Google consent
//! redirect that feeds federated sign-in.

pub mod google;
pub mod toolkit;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use google::{GoogleOAuth, GoogleOAuthClient};
pub use toolkit::IdentityToolkitClient;

/// Lifetime assumed for an ID token when the provider omits `expiresIn`
pub const DEFAULT_TOKEN_LIFETIME_SECS: u64 = 3600;

/// Tokens and account data returned by sign-in and sign-up
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthTokens {
    /// Provider account id
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
    pub id_token: String,
    pub refresh_token: String,
    /// Seconds until `id_token` expires
    pub expires_in: u64,
}

/// A renewed ID token from the secure token service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshedTokens {
    pub id_token: String,
    /// The provider may rotate the refresh token
    pub refresh_token: String,
    pub expires_in: u64,
}

/// Account state returned by lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub uid: String,
    pub email: String,
    pub email_verified: bool,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
}

/// Identity provider failures, keyed by the provider's error code
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    #[error("email already in use")]
    EmailExists,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("user disabled")]
    UserDisabled,
    #[error("action code expired")]
    ExpiredActionCode,
    #[error("action code invalid")]
    InvalidActionCode,
    #[error("weak password")]
    WeakPassword,
    #[error("too many attempts")]
    TooManyAttempts,
    #[error("ID token expired or revoked")]
    TokenExpired,
    #[error("account exists with a different sign-in method")]
    AccountExistsWithDifferentCredential,
    #[error("identity provider error: {0}")]
    Provider(String),
    #[error("identity provider unreachable: {0}")]
    Network(String),
}

impl IdentityError {
    /// Map a provider error message such as `WEAK_PASSWORD : Password should be...`
    pub fn from_code(message: &str) -> Self {
        let code = message.split(" : ").next().unwrap_or(message).trim();
        match code {
            "EMAIL_EXISTS" => IdentityError::EmailExists,
            "EMAIL_NOT_FOUND" | "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" => {
                IdentityError::InvalidCredentials
            }
            "USER_DISABLED" => IdentityError::UserDisabled,
            "EXPIRED_OOB_CODE" => IdentityError::ExpiredActionCode,
            "INVALID_OOB_CODE" => IdentityError::InvalidActionCode,
            "TOO_MANY_ATTEMPTS_TRY_LATER" => IdentityError::TooManyAttempts,
            "TOKEN_EXPIRED" | "INVALID_ID_TOKEN" | "CREDENTIAL_TOO_OLD_LOGIN_AGAIN" => {
                IdentityError::TokenExpired
            }
            "FEDERATED_USER_ID_ALREADY_LINKED" => IdentityError::AccountExistsWithDifferentCredential,
            c if c.starts_with("WEAK_PASSWORD") => IdentityError::WeakPassword,
            other => IdentityError::Provider(other.to_string()),
        }
    }
}

/// Operations delegated to the identity provider
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<AuthTokens, IdentityError>;

    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthTokens, IdentityError>;

    async fn update_display_name(&self, id_token: &str, display_name: &str) -> Result<(), IdentityError>;

    async fn lookup(&self, id_token: &str) -> Result<AccountInfo, IdentityError>;

    async fn send_email_verification(&self, id_token: &str, continue_url: &str) -> Result<(), IdentityError>;

    async fn send_password_reset(&self, email: &str, continue_url: &str) -> Result<(), IdentityError>;

    /// Check a reset code and return the account email it belongs to
    async fn verify_password_reset_code(&self, oob_code: &str) -> Result<String, IdentityError>;

    async fn confirm_password_reset(&self, oob_code: &str, new_password: &str) -> Result<(), IdentityError>;

    /// Apply an email verification code
    async fn apply_action_code(&self, oob_code: &str) -> Result<(), IdentityError>;

    /// Exchange a refresh token for a new ID token
    async fn refresh_id_token(&self, refresh_token: &str) -> Result<RefreshedTokens, IdentityError>;

    /// Sign in (or sign up) with a Google ID token obtained from the consent
    /// redirect. `request_uri` is the redirect URI the token was issued for.
    async fn sign_in_with_google(&self, google_id_token: &str, request_uri: &str) -> Result<AuthTokens, IdentityError>;
}
