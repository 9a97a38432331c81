//! Process configuration read from the environment.

use std::path::PathBuf;

use chrono::Duration;
use thiserror::Error;

use courtside_auth::{RoleConfig, RoleConfigError};
use courtside_core::OrgId;

/// Role configuration shipped with the binary.
pub const BUNDLED_ROLE_CONFIG: &str = include_str!("../../../config/roles.json");

pub const DEFAULT_SESSION_TTL_SECS: i64 = 15 * 60;
pub const DEFAULT_COOKIE_NAME: &str = "courtside_sid";
pub const DEFAULT_RATE_LIMIT_MAX: u32 = 10;
pub const DEFAULT_RATE_LIMIT_WINDOW_SECS: i64 = 60;
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

pub const MAX_SESSION_TTL_SECS: i64 = 30 * 24 * 60 * 60;
pub const MAX_RATE_LIMIT_WINDOW_SECS: i64 = 24 * 60 * 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key}: invalid value '{value}' ({reason})")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    RoleConfig(#[from] RoleConfigError),
}

/// Fixed-window policy for session-mutating routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub max: u32,
    pub window: Duration,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            max: DEFAULT_RATE_LIMIT_MAX,
            window: Duration::seconds(DEFAULT_RATE_LIMIT_WINDOW_SECS),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AccessConfig {
    /// Presence selects the Postgres directory and session store.
    pub database_url: Option<String>,
    /// Presence selects the Redis rate limiter (with the `redis` feature).
    pub redis_url: Option<String>,
    pub session_ttl: Duration,
    pub cookie_name: String,
    pub cookie_secure: bool,
    pub roles: RoleConfig,
    pub identity_tokens_path: Option<PathBuf>,
    pub rate_limit: RateLimitPolicy,
    /// Key rate limits on the first `X-Forwarded-For` hop instead of the peer
    /// address. Only safe behind a proxy that overwrites the header.
    pub trust_forwarded_for: bool,
    pub auto_enroll_org: Option<OrgId>,
    pub bind_addr: String,
}

impl AccessConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let session_ttl = bounded_secs(
            get("SESSION_TTL_SECS"),
            "SESSION_TTL_SECS",
            DEFAULT_SESSION_TTL_SECS,
            MAX_SESSION_TTL_SECS,
        )?;
        let max = parse_or(get("MUTATION_RATE_LIMIT_MAX"), "MUTATION_RATE_LIMIT_MAX", DEFAULT_RATE_LIMIT_MAX)?;
        let window = bounded_secs(
            get("MUTATION_RATE_LIMIT_WINDOW_SECS"),
            "MUTATION_RATE_LIMIT_WINDOW_SECS",
            DEFAULT_RATE_LIMIT_WINDOW_SECS,
            MAX_RATE_LIMIT_WINDOW_SECS,
        )?;

        let roles = match get("ROLE_CONFIG_PATH") {
            Some(path) => {
                let path = PathBuf::from(path);
                let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
                    path: path.clone(),
                    source,
                })?;
                RoleConfig::from_json(&raw)?
            }
            None => RoleConfig::from_json(BUNDLED_ROLE_CONFIG)?,
        };

        Ok(Self {
            database_url: get("DATABASE_URL"),
            redis_url: get("REDIS_URL"),
            session_ttl,
            cookie_name: get("SESSION_COOKIE_NAME").unwrap_or_else(|| DEFAULT_COOKIE_NAME.to_string()),
            cookie_secure: parse_bool(get("COOKIE_SECURE"), "COOKIE_SECURE")?,
            roles,
            identity_tokens_path: get("IDENTITY_TOKENS_PATH").map(PathBuf::from),
            rate_limit: RateLimitPolicy { max, window },
            trust_forwarded_for: parse_bool(get("TRUST_FORWARDED_FOR"), "TRUST_FORWARDED_FOR")?,
            auto_enroll_org: get("AUTO_ENROLL_ORG").map(OrgId::from),
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
        })
    }
}

fn parse_or<T>(raw: Option<String>, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(value) => value.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key,
            reason: e.to_string(),
            value,
        }),
    }
}

/// A positive number of seconds no larger than `max`.
fn bounded_secs(raw: Option<String>, key: &'static str, default: i64, max: i64) -> Result<Duration, ConfigError> {
    let secs: i64 = parse_or(raw, key, default)?;
    let invalid = |reason: String| ConfigError::InvalidValue {
        key,
        value: secs.to_string(),
        reason,
    };

    if secs <= 0 {
        return Err(invalid("must be positive".into()));
    }
    if secs > max {
        return Err(invalid(format!("must be at most {max}")));
    }
    Duration::try_seconds(secs).ok_or_else(|| invalid("out of range".into()))
}

fn parse_bool(raw: Option<String>, key: &'static str) -> Result<bool, ConfigError> {
    match raw.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None => Ok(false),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(_) => Err(ConfigError::InvalidValue {
            key,
            value: raw.unwrap_or_default(),
            reason: "expected a boolean".into(),
        }),
    }
}
