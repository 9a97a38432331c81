//! Fixed-window rate limiting for session-mutating routes.
//!
//! Counting is per `(route, key)`. The first request opens a window of
//! `window` length; every request inside it increments the count and requests
//! beyond `max` are denied until the window closes. Bursts straddling a window
//! boundary are accepted.

use async_trait::async_trait;
use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

pub mod in_memory;
#[cfg(feature = "redis")]
pub mod redis;

pub use in_memory::{InMemoryRateLimiter, RateBucket};
#[cfg(feature = "redis")]
pub use self::redis::RedisRateLimiter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateDecision {
    pub allowed: bool,
    /// Whole seconds until the window closes; set on denial only.
    pub retry_after_secs: Option<u64>,
}

impl RateDecision {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            retry_after_secs: None,
        }
    }

    pub fn deny(remaining: Duration) -> Self {
        Self {
            allowed: false,
            retry_after_secs: Some(retry_after_secs(remaining)),
        }
    }
}

#[async_trait]
pub trait MutationRateLimiter: Send + Sync {
    async fn check(&self, route: &str, key: &str, window: Duration, max: u32) -> Result<RateDecision, StoreError>;
}

/// Seconds to wait, rounded up and never below one.
pub fn retry_after_secs(remaining: Duration) -> u64 {
    let millis = remaining.num_milliseconds().max(0) as u64;
    millis.div_ceil(1000).max(1)
}
