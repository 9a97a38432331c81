//! Backend wiring.
//!
//! The directory and session store are chosen once here from configuration:
//! `DATABASE_URL` selects Postgres, otherwise everything stays in memory.
//! Handlers only ever see the trait objects.

use std::sync::Arc;

use chrono::Duration;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use courtside_infra::{
    AccessConfig, AccessService, InMemoryDirectory, InMemoryRateLimiter, InMemorySessionStore, MutationRateLimiter,
    PostgresDirectory, PostgresSessionStore, RateLimitPolicy, StaticIdentityVerifier, StoreError, ensure_schema,
    reconcile,
};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to read identity tokens from {path}: {source}")]
    IdentityTokensIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("identity tokens file {path} is not valid JSON: {source}")]
    IdentityTokensParse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to connect to Postgres: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieSettings {
    pub name: String,
    pub secure: bool,
    pub max_age: Duration,
}

impl CookieSettings {
    pub fn from_config(config: &AccessConfig) -> Self {
        Self {
            name: config.cookie_name.clone(),
            secure: config.cookie_secure,
            max_age: config.session_ttl,
        }
    }
}

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub access: AccessService,
    pub limiter: Arc<dyn MutationRateLimiter>,
    pub rate_limit: RateLimitPolicy,
    /// Key rate limits on `X-Forwarded-For` rather than the peer address.
    pub trust_forwarded_for: bool,
    pub cookie: CookieSettings,
}

/// Build the state described by `config`, connecting to Postgres / Redis when configured.
pub async fn build_state(config: &AccessConfig) -> Result<AppState, StartupError> {
    let identity = Arc::new(load_identity_tokens(config)?);
    let roles = Arc::new(config.roles.clone());

    let access = match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new().max_connections(10).connect(url).await?;
            ensure_schema(&pool).await?;

            let directory = Arc::new(PostgresDirectory::new(pool.clone()));
            reconcile(directory.as_ref(), &roles).await?;

            tracing::info!("using Postgres directory and session store");
            AccessService::new(
                identity,
                directory,
                Arc::new(PostgresSessionStore::new(pool, config.session_ttl)),
                roles,
            )
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory directory and sessions (default role for everyone)");
            AccessService::new(
                identity,
                Arc::new(InMemoryDirectory::new()),
                Arc::new(InMemorySessionStore::new(config.session_ttl)),
                roles,
            )
        }
    }
    .with_auto_enroll(config.auto_enroll_org.clone());

    Ok(AppState {
        access,
        limiter: build_limiter(config).await?,
        rate_limit: config.rate_limit,
        trust_forwarded_for: config.trust_forwarded_for,
        cookie: CookieSettings::from_config(config),
    })
}

/// Fully in-memory state around a caller-owned directory (tests, local runs).
pub fn in_memory_state(
    config: &AccessConfig,
    identity: StaticIdentityVerifier,
    directory: Arc<InMemoryDirectory>,
) -> AppState {
    let access = AccessService::new(
        Arc::new(identity),
        directory,
        Arc::new(InMemorySessionStore::new(config.session_ttl)),
        Arc::new(config.roles.clone()),
    )
    .with_auto_enroll(config.auto_enroll_org.clone());

    AppState {
        access,
        limiter: Arc::new(InMemoryRateLimiter::new()),
        rate_limit: config.rate_limit,
        trust_forwarded_for: config.trust_forwarded_for,
        cookie: CookieSettings::from_config(config),
    }
}

fn load_identity_tokens(config: &AccessConfig) -> Result<StaticIdentityVerifier, StartupError> {
    let Some(path) = &config.identity_tokens_path else {
        tracing::warn!("IDENTITY_TOKENS_PATH not set; every login will be rejected");
        return Ok(StaticIdentityVerifier::new());
    };

    let display = path.display().to_string();
    let raw = std::fs::read_to_string(path).map_err(|source| StartupError::IdentityTokensIo {
        path: display.clone(),
        source,
    })?;
    let verifier = StaticIdentityVerifier::from_json(&raw)
        .map_err(|source| StartupError::IdentityTokensParse { path: display, source })?;

    tracing::info!(tokens = verifier.len(), "loaded static identity tokens");
    Ok(verifier)
}

#[cfg(feature = "redis")]
async fn build_limiter(config: &AccessConfig) -> Result<Arc<dyn MutationRateLimiter>, StartupError> {
    match &config.redis_url {
        Some(url) => {
            let limiter = courtside_infra::RedisRateLimiter::connect(url).await?;
            tracing::info!("using Redis mutation rate limiter");
            Ok(Arc::new(limiter))
        }
        None => Ok(Arc::new(InMemoryRateLimiter::new())),
    }
}

#[cfg(not(feature = "redis"))]
async fn build_limiter(config: &AccessConfig) -> Result<Arc<dyn MutationRateLimiter>, StartupError> {
    if config.redis_url.is_some() {
        tracing::warn!("REDIS_URL set but redis feature not enabled, falling back to in-memory rate limiting");
    }
    Ok(Arc::new(InMemoryRateLimiter::new()))
}
