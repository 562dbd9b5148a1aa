//! Rate limiter for sign-in attempts
//!
//! - Failed sign-ins per email: 5 per 15 minutes
//! - Sign-in submissions per client IP: 10 per minute

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::hash::Hash;
use std::net::IpAddr;
use tokio::sync::RwLock;

/// Timestamps of recent events per key, counted over a sliding window
struct SlidingWindow<K> {
    limit: usize,
    window: Duration,
    events: RwLock<HashMap<K, Vec<DateTime<Utc>>>>,
}

impl<K: Eq + Hash> SlidingWindow<K> {
    fn new(limit: usize, window: Duration) -> Self {
        Self {
            limit,
            window,
            events: RwLock::new(HashMap::new()),
        }
    }

    async fn is_limited(&self, key: K) -> bool {
        let cutoff = Utc::now() - self.window;
        let mut events = self.events.write().await;
        let times = events.entry(key).or_default();
        times.retain(|t| *t > cutoff);
        times.len() >= self.limit
    }

    async fn record(&self, key: K) {
        self.events.write().await.entry(key).or_default().push(Utc::now());
    }

    async fn clear(&self, key: &K) {
        self.events.write().await.remove(key);
    }

    async fn prune(&self) {
        let cutoff = Utc::now() - self.window;
        self.events.write().await.retain(|_, times| {
            times.retain(|t| *t > cutoff);
            !times.is_empty()
        });
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.events.read().await.len()
    }
}

/// Sign-in rate limiter
pub struct LoginRateLimiter {
    failures_by_email: SlidingWindow<String>,
    requests_by_ip: SlidingWindow<IpAddr>,
}

impl LoginRateLimiter {
    pub fn new() -> Self {
        Self {
            failures_by_email: SlidingWindow::new(5, Duration::minutes(15)),
            requests_by_ip: SlidingWindow::new(10, Duration::minutes(1)),
        }
    }

    /// Emails compare case-insensitively.
    pub async fn is_email_limited(&self, email: &str) -> bool {
        self.failures_by_email.is_limited(email.trim().to_lowercase()).await
    }

    pub async fn record_failed_attempt(&self, email: &str) {
        self.failures_by_email.record(email.trim().to_lowercase()).await;
    }

    /// Forget failures after a successful sign-in
    pub async fn clear_email_attempts(&self, email: &str) {
        self.failures_by_email.clear(&email.trim().to_lowercase()).await;
    }

    pub async fn is_ip_limited(&self, ip: IpAddr) -> bool {
        self.requests_by_ip.is_limited(ip).await
    }

    pub async fn record_ip_request(&self, ip: IpAddr) {
        self.requests_by_ip.record(ip).await;
    }

    /// Drop expired entries; run periodically
    pub async fn cleanup(&self) {
        self.failures_by_email.prune().await;
        self.requests_by_ip.prune().await;
    }
}

impl Default for LoginRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
