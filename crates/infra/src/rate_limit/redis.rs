//! Redis-backed limiter shared by every process behind the same Redis.
//!
//! Counter increment, window start and TTL read happen in one Lua script,
//! so the read-check-write sequence is atomic per key.

use async_trait::async_trait;
use chrono::Duration;
use redis::aio::MultiplexedConnection;

use super::{MutationRateLimiter, RateDecision};
use crate::error::{StoreError, map_redis_error};

const KEY_PREFIX: &str = "courtside:rate";

const FIXED_WINDOW_SCRIPT: &str = r#"
local count = redis.call('INCR', KEYS[1])
if count == 1 then
    redis.call('PEXPIRE', KEYS[1], ARGV[1])
end
local ttl = redis.call('PTTL', KEYS[1])
if ttl < 0 then
    redis.call('PEXPIRE', KEYS[1], ARGV[1])
    ttl = tonumber(ARGV[1])
end
return {count, ttl}
"#;

#[derive(Clone)]
pub struct RedisRateLimiter {
    connection: MultiplexedConnection,
    script: redis::Script,
}

impl RedisRateLimiter {
    pub async fn connect(redis_url: impl AsRef<str>) -> Result<Self, StoreError> {
        let client = redis::Client::open(redis_url.as_ref()).map_err(|e| map_redis_error("rate_limit.connect", e))?;
        let connection = client
            .get_multiplexed_tokio_connection()
            .await
            .map_err(|e| map_redis_error("rate_limit.connect", e))?;

        Ok(Self {
            connection,
            script: redis::Script::new(FIXED_WINDOW_SCRIPT),
        })
    }

    fn key(route: &str, key: &str) -> String {
        format!("{KEY_PREFIX}:{route}:{key}")
    }
}

impl std::fmt::Debug for RedisRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisRateLimiter").finish_non_exhaustive()
    }
}

#[async_trait]
impl MutationRateLimiter for RedisRateLimiter {
    async fn check(&self, route: &str, key: &str, window: Duration, max: u32) -> Result<RateDecision, StoreError> {
        let mut connection = self.connection.clone();
        let (count, ttl_ms): (u64, i64) = self
            .script
            .key(Self::key(route, key))
            .arg(window.num_milliseconds().max(1))
            .invoke_async(&mut connection)
            .await
            .map_err(|e| map_redis_error("rate_limit.check", e))?;

        if count > u64::from(max) {
            tracing::debug!(route, count, max, "mutation rate limit exceeded");
            return Ok(RateDecision::deny(Duration::milliseconds(ttl_ms)));
        }
        Ok(RateDecision::allow())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_namespaced_by_route() {
        assert_eq!(
            RedisRateLimiter::key("POST /auth/session", "10.0.0.1"),
            "courtside:rate:POST /auth/session:10.0.0.1"
        );
    }
}
