//! Session persistence.
//!
//! Sessions are immutable snapshots with a fixed lifetime. Expiry is lazy:
//! a `get` past `expires_at` deletes the record before returning `None`, so
//! no caller ever observes an expired session. There is no background sweep.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use courtside_auth::{NewSession, Session, SessionHandle};
use courtside_core::SessionId;

use crate::error::StoreError;

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemorySessionStore;
pub use postgres::PostgresSessionStore;

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persist a new session with a fresh id and the store's fixed TTL.
    async fn create(&self, session: NewSession) -> Result<SessionHandle, StoreError>;

    /// Live session for `id`; expired and unknown ids both yield `None`.
    async fn get(&self, id: SessionId) -> Result<Option<Session>, StoreError>;

    /// Delete the session. Unknown or already-expired ids are not an error.
    async fn destroy(&self, id: SessionId) -> Result<(), StoreError>;
}

/// `created_at + ttl`, or an error when the sum leaves chrono's range.
pub(crate) fn expiry(created_at: DateTime<Utc>, ttl: Duration) -> Result<DateTime<Utc>, StoreError> {
    created_at
        .checked_add_signed(ttl)
        .ok_or_else(|| StoreError::unavailable("session.create", format!("session ttl {ttl} overflows the clock")))
}
