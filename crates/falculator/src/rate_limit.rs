//! Fixed-window request counter for callers without their own credential.

use crate::config::RateLimitConfig;
use dashmap::DashMap;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Clone, Copy)]
pub struct RateLimitEntry {
    pub count: u32,
    pub window_start: Instant,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Rate limit exceeded, retry in {}s", retry_after.as_secs())]
pub struct RateLimited {
    pub retry_after: Duration,
}

/// In-memory table keyed by caller identity. Entries live until their window
/// expires and [`RateLimiter::prune`] runs.
#[derive(Debug)]
pub struct RateLimiter {
    entries: DashMap<String, RateLimitEntry>,
    max_requests: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            max_requests,
            window,
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.max_requests, config.window())
    }

    pub fn check_and_increment(&self, identity: &str) -> Result<(), RateLimited> {
        self.check_and_increment_at(identity, Instant::now())
    }

    /// Counts one request for `identity` at `now`. The entry is held under its
    /// shard lock for the whole check, so concurrent callers never lose an
    /// increment.
    pub fn check_and_increment_at(&self, identity: &str, now: Instant) -> Result<(), RateLimited> {
        let mut entry = self
            .entries
            .entry(identity.to_string())
            .or_insert(RateLimitEntry {
                count: 0,
                window_start: now,
            });

        let elapsed = now.saturating_duration_since(entry.window_start);
        if elapsed >= self.window {
            entry.count = 0;
            entry.window_start = now;
        }

        if entry.count >= self.max_requests {
            let retry_after = self.window.saturating_sub(elapsed);
            tracing::debug!(
                identity,
                count = entry.count,
                retry_after_secs = retry_after.as_secs(),
                "rate limit hit"
            );
            return Err(RateLimited { retry_after });
        }

        entry.count += 1;
        Ok(())
    }

    /// Drop entries whose window has expired.
    pub fn prune(&self) -> usize {
        self.prune_at(Instant::now())
    }

    pub fn prune_at(&self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| now.saturating_duration_since(entry.window_start) < self.window);
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            tracing::debug!(removed, "pruned expired rate limit entries");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::from_config(&RateLimitConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const HOUR: Duration = Duration::from_secs(3600);

    #[test]
    fn test_eleventh_request_is_rejected() {
        let limiter = RateLimiter::new(10, HOUR);
        let start = Instant::now();

        for i in 0..10 {
            let now = start + Duration::from_secs(i);
            assert!(limiter.check_and_increment_at("203.0.113.7", now).is_ok());
        }
        let err = limiter
            .check_and_increment_at("203.0.113.7", start + Duration::from_secs(600))
            .unwrap_err();
        assert_eq!(err.retry_after, Duration::from_secs(3000));

        // Other callers have their own budget.
        assert!(limiter.check_and_increment_at("198.51.100.1", start).is_ok());
    }

    #[test]
    fn test_window_resets_after_expiry() {
        let limiter = RateLimiter::new(2, HOUR);
        let start = Instant::now();

        limiter.check_and_increment_at("caller", start).unwrap();
        limiter.check_and_increment_at("caller", start).unwrap();
        assert!(limiter.check_and_increment_at("caller", start).is_err());

        assert!(limiter.check_and_increment_at("caller", start + HOUR).is_ok());
    }

    #[test]
    fn test_prune_drops_expired_entries() {
        let limiter = RateLimiter::new(5, HOUR);
        let start = Instant::now();
        limiter.check_and_increment_at("old", start).unwrap();
        limiter
            .check_and_increment_at("fresh", start + Duration::from_secs(1800))
            .unwrap();

        assert_eq!(limiter.prune_at(start + HOUR), 1);
        assert_eq!(limiter.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_increments_are_not_lost() {
        let limiter = Arc::new(RateLimiter::new(50, HOUR));
        let mut handles = Vec::new();
        for _ in 0..100 {
            let limiter = limiter.clone();
            handles.push(tokio::spawn(async move {
                limiter.check_and_increment("shared").is_ok()
            }));
        }

        let mut accepted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                accepted += 1;
            }
        }
        assert_eq!(accepted, 50);
    }
}
