//! Session model

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// ID tokens this close to expiry are renewed before use
const TOKEN_RENEWAL_MARGIN_SECS: i64 = 300;

/// Server-side session of a signed-in account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Session ID (opaque cookie token)
    pub id: String,
    /// Identity provider account id
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    pub email_verified: bool,
    /// Provider ID token, used for account operations
    pub id_token: String,
    pub refresh_token: String,
    /// When `id_token` stops being accepted by the provider
    pub token_expires_at: DateTime<Utc>,
    /// Expiration timestamp
    pub expires_at: DateTime<Utc>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Check if the session has expired
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }

    /// The provider ID token is expired or about to expire
    pub fn token_is_stale(&self) -> bool {
        self.token_expires_at - Duration::seconds(TOKEN_RENEWAL_MARGIN_SECS) <= Utc::now()
    }

    /// Name shown in the welcome line: display name, then the local part of
    /// the email, then "User".
    pub fn greeting_name(&self) -> String {
        if let Some(name) = self.display_name.as_deref().filter(|n| !n.trim().is_empty()) {
            return name.to_string();
        }
        match self.email.split('@').next() {
            Some(local) if !local.is_empty() => local.to_string(),
            _ => "User".to_string(),
        }
    }
}
