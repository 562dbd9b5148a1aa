//! Identity tokens for the users API
//!
//! The users service sits behind an identity-aware front end. Requests carry
//! a Google-signed identity token whose audience is the service base URL.

use anyhow::{Context, Result};
use async_trait::async_trait;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{TokenMode, UsersApiConfig};

/// Source of bearer tokens for authenticated users API calls
#[async_trait]
pub trait IdTokenSource: Send + Sync {
    /// Returns `Ok(None)` when requests should go out without a token.
    async fn token(&self) -> Result<Option<String>>;
}

/// Fetches identity tokens from the instance metadata server
pub struct MetadataTokenSource {
    client: reqwest::Client,
    metadata_url: String,
    audience: String,
    tokens: Cache<String, String>,
}

impl MetadataTokenSource {
    pub fn new(client: reqwest::Client, metadata_url: &str, audience: &str, ttl: Duration) -> Self {
        Self {
            client,
            metadata_url: metadata_url.trim_end_matches('/').to_string(),
            audience: audience.to_string(),
            tokens: Cache::builder().max_capacity(4).time_to_live(ttl).build(),
        }
    }

    fn identity_url(&self) -> String {
        format!(
            "{}/computeMetadata/v1/instance/service-accounts/default/identity?audience={}",
            self.metadata_url,
            urlencoding::encode(&self.audience)
        )
    }

    async fn fetch(&self) -> Result<String> {
        let response = self
            .client
            .get(self.identity_url())
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .context("Failed to reach metadata server")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Metadata server returned status {}", status);
        }

        let token = response
            .text()
            .await
            .context("Failed to read identity token")?
            .trim()
            .to_string();
        if token.is_empty() {
            anyhow::bail!("Metadata server returned an empty identity token");
        }
        Ok(token)
    }
}

#[async_trait]
impl IdTokenSource for MetadataTokenSource {
    async fn token(&self) -> Result<Option<String>> {
        if let Some(token) = self.tokens.get(&self.audience).await {
            return Ok(Some(token));
        }
        let token = self.fetch().await?;
        self.tokens.insert(self.audience.clone(), token.clone()).await;
        Ok(Some(token))
    }
}

/// Fixed token from configuration
pub struct StaticTokenSource(String);

impl StaticTokenSource {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl IdTokenSource for StaticTokenSource {
    async fn token(&self) -> Result<Option<String>> {
        Ok(Some(self.0.clone()))
    }
}

/// Never attaches a token
pub struct NoTokenSource;

#[async_trait]
impl IdTokenSource for NoTokenSource {
    async fn token(&self) -> Result<Option<String>> {
        Ok(None)
    }
}

/// Build the token source selected by `users_api.token_mode`
pub fn token_source_from_config(config: &UsersApiConfig, client: reqwest::Client) -> Arc<dyn IdTokenSource> {
    match config.token_mode {
        TokenMode::Metadata => Arc::new(MetadataTokenSource::new(
            client,
            &config.metadata_url,
            &config.base_url,
            Duration::from_secs(config.token_ttl_seconds),
        )),
        TokenMode::Static => Arc::new(StaticTokenSource::new(
            config.static_token.clone().unwrap_or_default(),
        )),
        TokenMode::None => Arc::new(NoTokenSource),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[tokio::test]
    async fn test_static_and_none_sources() {
        assert_eq!(StaticTokenSource::new("abc").token().await.unwrap(), Some("abc".to_string()));
        assert_eq!(NoTokenSource.token().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_metadata_source_fetches_and_caches() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/computeMetadata/v1/instance/service-accounts/default/identity")
                    .query_param("audience", "https://users.example")
                    .header("Metadata-Flavor", "Google");
                then.status(200).body("id-token-1\n");
            })
            .await;

        let source = MetadataTokenSource::new(
            reqwest::Client::new(),
            &server.base_url(),
            "https://users.example",
            Duration::from_secs(60),
        );

        assert_eq!(source.token().await.unwrap(), Some("id-token-1".to_string()));
        assert_eq!(source.token().await.unwrap(), Some("id-token-1".to_string()));
        assert_eq!(mock.hits_async().await, 1);
    }

    #[tokio::test]
    async fn test_metadata_source_error_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET);
                then.status(404);
            })
            .await;

        let source = MetadataTokenSource::new(
            reqwest::Client::new(),
            &server.base_url(),
            "https://users.example",
            Duration::from_secs(60),
        );

        assert!(source.token().await.is_err());
    }

    #[tokio::test]
    async fn test_source_from_config() {
        let mut config = UsersApiConfig::default();
        config.token_mode = TokenMode::Static;
        config.static_token = Some("cfg-token".to_string());

        let source = token_source_from_config(&config, reqwest::Client::new());
        assert_eq!(source.token().await.unwrap(), Some("cfg-token".to_string()));

        config.token_mode = TokenMode::None;
        let source = token_source_from_config(&config, reqwest::Client::new());
        assert_eq!(source.token().await.unwrap(), None);
    }
}
