use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use courtside_core::{Clock, SystemClock};

use super::{MutationRateLimiter, RateDecision};
use crate::error::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateBucket {
    pub count: u32,
    pub reset_at: DateTime<Utc>,
}

impl RateBucket {
    fn open(reset_at: DateTime<Utc>) -> Self {
        Self { count: 1, reset_at }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct BucketKey {
    route: String,
    key: String,
}

/// Process-local limiter.
///
/// Buckets are reused across windows and never evicted.
pub struct InMemoryRateLimiter {
    buckets: Mutex<HashMap<BucketKey, RateBucket>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryRateLimiter {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            clock,
        }
    }

    pub fn bucket(&self, route: &str, key: &str) -> Option<RateBucket> {
        let buckets = self.buckets.lock().ok()?;
        buckets
            .get(&BucketKey {
                route: route.to_string(),
                key: key.to_string(),
            })
            .copied()
    }
}

impl Default for InMemoryRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryRateLimiter").finish_non_exhaustive()
    }
}

#[async_trait]
impl MutationRateLimiter for InMemoryRateLimiter {
    async fn check(&self, route: &str, key: &str, window: Duration, max: u32) -> Result<RateDecision, StoreError> {
        let mut buckets = self
            .buckets
            .lock()
            .map_err(|_| StoreError::poisoned("rate_limit.check"))?;

        let now = self.clock.now();
        let next_reset = now
            .checked_add_signed(window)
            .ok_or_else(|| StoreError::unavailable("rate_limit.check", format!("window {window} overflows the clock")))?;

        let bucket = buckets
            .entry(BucketKey {
                route: route.to_string(),
                key: key.to_string(),
            })
            .and_modify(|b| {
                if now > b.reset_at {
                    *b = RateBucket::open(next_reset);
                } else {
                    b.count = b.count.saturating_add(1);
                }
            })
            .or_insert_with(|| RateBucket::open(next_reset));

        if bucket.count > max {
            let decision = RateDecision::deny(bucket.reset_at - now);
            tracing::debug!(route, count = bucket.count, max, "mutation rate limit exceeded");
            return Ok(decision);
        }
        Ok(RateDecision::allow())
    }
}

#[cfg(test)]
mod tests {
    use courtside_core::ManualClock;

    use super::*;

    fn window() -> Duration {
        Duration::seconds(60)
    }

    fn limiter() -> (Arc<ManualClock>, InMemoryRateLimiter) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        (clock.clone(), InMemoryRateLimiter::with_clock(clock))
    }

    #[tokio::test]
    async fn fourth_call_over_a_limit_of_three_is_denied() {
        let (_clock, limiter) = limiter();

        let mut decisions = Vec::new();
        for _ in 0..4 {
            decisions.push(limiter.check("POST /auth/session", "10.0.0.1", window(), 3).await.unwrap());
        }

        assert!(decisions[..3].iter().all(|d| d.allowed && d.retry_after_secs.is_none()));
        assert!(!decisions[3].allowed);
        assert_eq!(decisions[3].retry_after_secs, Some(60));
    }

    #[tokio::test]
    async fn window_resets_after_it_closes() {
        let (clock, limiter) = limiter();
        for _ in 0..2 {
            limiter.check("logout", "k", window(), 1).await.unwrap();
        }
        assert!(!limiter.check("logout", "k", window(), 1).await.unwrap().allowed);

        clock.advance(Duration::seconds(45));
        let denied = limiter.check("logout", "k", window(), 1).await.unwrap();
        assert_eq!(denied.retry_after_secs, Some(15));

        clock.advance(Duration::seconds(15));
        assert!(!limiter.check("logout", "k", window(), 1).await.unwrap().allowed);

        clock.advance(Duration::milliseconds(1));
        assert!(limiter.check("logout", "k", window(), 1).await.unwrap().allowed);
        assert_eq!(limiter.bucket("logout", "k").map(|b| b.count), Some(1));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_checks_on_one_key_admit_exactly_max() {
        let (_clock, limiter) = limiter();
        let limiter = Arc::new(limiter);

        let checks: Vec<_> = (0..32)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move { limiter.check("POST /auth/session", "10.0.0.1", window(), 5).await })
            })
            .collect();

        let mut allowed = 0;
        for check in checks {
            if check.await.unwrap().unwrap().allowed {
                allowed += 1;
            }
        }

        assert_eq!(allowed, 5);
        assert_eq!(limiter.bucket("POST /auth/session", "10.0.0.1").map(|b| b.count), Some(32));
    }

    #[tokio::test]
    async fn routes_and_keys_are_counted_separately() {
        let (_clock, limiter) = limiter();
        assert!(limiter.check("login", "a", window(), 1).await.unwrap().allowed);
        assert!(limiter.check("login", "b", window(), 1).await.unwrap().allowed);
        assert!(limiter.check("logout", "a", window(), 1).await.unwrap().allowed);
        assert!(!limiter.check("login", "a", window(), 1).await.unwrap().allowed);
    }
}
