//! Session store
//!
//! Sessions live in the in-process cache under `session:{id}` with a TTL
//! equal to the configured session lifetime. The browser holds only the id.
//! The store gets its own cache so profile traffic cannot evict sessions.

use anyhow::Result;
use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::cache::{CacheLayer, MemoryCache};
use crate::identity::{AccountInfo, AuthTokens};
use crate::models::Session;

fn session_key(id: &str) -> String {
    format!("session:{}", id)
}

/// Creates, looks up and removes sessions
pub struct SessionStore {
    cache: Arc<MemoryCache>,
    ttl: std::time::Duration,
}

impl SessionStore {
    pub fn new(cache: Arc<MemoryCache>, ttl_seconds: u64) -> Self {
        Self {
            cache,
            ttl: std::time::Duration::from_secs(ttl_seconds),
        }
    }

    /// Start a session for a signed-in account
    pub async fn create(&self, tokens: &AuthTokens, account: &AccountInfo) -> Result<Session> {
        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4().to_string(),
            uid: tokens.uid.clone(),
            email: if account.email.is_empty() {
                tokens.email.clone()
            } else {
                account.email.clone()
            },
            display_name: account.display_name.clone().or_else(|| tokens.display_name.clone()),
            photo_url: account.photo_url.clone(),
            email_verified: account.email_verified,
            id_token: tokens.id_token.clone(),
            refresh_token: tokens.refresh_token.clone(),
            token_expires_at: now + Duration::seconds(tokens.expires_in as i64),
            expires_at: now + Duration::seconds(self.ttl.as_secs() as i64),
            created_at: now,
        };
        self.cache.set(&session_key(&session.id), &session, self.ttl).await?;
        tracing::debug!(uid = %session.uid, "Session created");
        Ok(session)
    }

    /// Look up a live session; expired entries are removed
    pub async fn get(&self, id: &str) -> Result<Option<Session>> {
        let session: Option<Session> = self.cache.get(&session_key(id)).await?;
        match session {
            Some(s) if s.is_expired() => {
                self.cache.delete(&session_key(id)).await?;
                Ok(None)
            }
            other => Ok(other),
        }
    }

    /// Store changed account fields, keeping the original expiry
    pub async fn update(&self, session: &Session) -> Result<()> {
        let remaining = (session.expires_at - Utc::now())
            .to_std()
            .unwrap_or(std::time::Duration::ZERO);
        if remaining.is_zero() {
            return self.delete(&session.id).await;
        }
        self.cache.set(&session_key(&session.id), session, remaining).await
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.cache.delete(&session_key(id)).await
    }
}
