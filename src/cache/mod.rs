//! Cache layer
//!
//! In-process caches backed by moka. Sessions get a [`MemoryCache`] of
//! their own; public profiles and the set of already-synced accounts share
//! a second one.
//!
//! # Usage
//!
//! ```rust,ignore
//! use mouth_metrics::cache::{create_cache, CacheLayer};
//! use mouth_metrics::config::CacheConfig;
//!
//! let cache = create_cache(&CacheConfig::default());
//! cache.set("key", &"value", Duration::from_secs(60)).await?;
//! ```

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;

use crate::config::{CacheConfig, SessionConfig};

pub use memory::MemoryCache;

/// Cache layer trait
///
/// Generic over the stored value, so it is used through concrete types
/// rather than as `dyn CacheLayer`.
#[async_trait]
pub trait CacheLayer: Send + Sync {
    /// Get a value from cache
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>>;

    /// Set a value in cache with TTL
    async fn set<T: Serialize + Send + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl: std::time::Duration,
    ) -> Result<()>;

    /// Delete a value from cache
    async fn delete(&self, key: &str) -> Result<()>;

    /// Delete all values matching a pattern
    async fn delete_pattern(&self, pattern: &str) -> Result<()>;
}

/// Create a cache instance sized from configuration
pub fn create_cache(config: &CacheConfig) -> Arc<MemoryCache> {
    Arc::new(MemoryCache::with_capacity(config.max_capacity))
}

/// Create the session cache, sized by `session.max_sessions`
pub fn create_session_cache(config: &SessionConfig) -> Arc<MemoryCache> {
    Arc::new(MemoryCache::with_capacity(config.max_sessions))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_create_memory_cache() {
        let config = CacheConfig::default();
        let cache = create_cache(&config);

        cache
            .set("test_key", &"test_value".to_string(), Duration::from_secs(60))
            .await
            .unwrap();
        let result: Option<String> = cache.get("test_key").await.unwrap();
        assert_eq!(result, Some("test_value".to_string()));
    }

    #[tokio::test]
    async fn test_create_cache_with_small_capacity() {
        let config = CacheConfig {
            max_capacity: 1,
            profile_ttl_seconds: 1,
        };
        let cache = create_cache(&config);

        cache.set("key", &1u32, Duration::from_secs(60)).await.unwrap();
        let result: Option<u32> = cache.get("key").await.unwrap();
        assert_eq!(result, Some(1));
    }

    #[tokio::test]
    async fn test_session_cache_is_separate() {
        let profiles = create_cache(&CacheConfig::default());
        let sessions = create_session_cache(&SessionConfig::default());

        sessions.set("session:a", &"s".to_string(), Duration::from_secs(60)).await.unwrap();
        let result: Option<String> = profiles.get("session:a").await.unwrap();
        assert_eq!(result, None);
    }
}
