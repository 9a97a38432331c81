//! Infrastructure layer: identity seam, directory, sessions, rate limiting, config.
//!
//! Every store sits behind a trait with an in-memory implementation (tests,
//! local runs) and a durable one. The choice is made once at startup.

pub mod access;
pub mod config;
pub mod directory;
pub mod error;
pub mod identity;
pub mod rate_limit;
pub mod resolver;
pub mod role_mirror;
pub mod schema;
pub mod session;

pub use access::{AccessService, LoginOutcome};
pub use config::{AccessConfig, ConfigError, RateLimitPolicy};
pub use directory::{Directory, InMemoryDirectory, PostgresDirectory, RoleGrants};
pub use error::StoreError;
pub use identity::{IdentityError, IdentityVerifier, StaticIdentityVerifier};
pub use rate_limit::{InMemoryRateLimiter, MutationRateLimiter, RateBucket, RateDecision};
#[cfg(feature = "redis")]
pub use rate_limit::RedisRateLimiter;
pub use resolver::AuthorizationResolver;
pub use role_mirror::{ReconcileReport, reconcile};
pub use schema::ensure_schema;
pub use session::{InMemorySessionStore, PostgresSessionStore, SessionStore};
