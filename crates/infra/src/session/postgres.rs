//! Postgres-backed session store.
//!
//! The resolved snapshot is stored as JSONB next to its timestamps. Lazy
//! expiry runs inside the read: one statement deletes the row if it is past
//! `expires_at` and returns it only if it is still live, so row-level
//! atomicity covers the read-check-delete sequence.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use courtside_auth::{NewSession, Session, SessionHandle};
use courtside_core::{Clock, SessionId, SystemClock};

use super::{SessionStore, expiry};
use crate::error::{StoreError, map_sqlx_error};

pub struct PostgresSessionStore {
    pool: PgPool,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl PostgresSessionStore {
    pub fn new(pool: PgPool, ttl: Duration) -> Self {
        Self::with_clock(pool, ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(pool: PgPool, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self { pool, ttl, clock }
    }
}

impl std::fmt::Debug for PostgresSessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresSessionStore").field("ttl", &self.ttl).finish()
    }
}

fn session_from_row(row: &sqlx::postgres::PgRow) -> Result<Session, sqlx::Error> {
    let id: Uuid = row.try_get("id")?;
    let Json(snapshot): Json<NewSession> = row.try_get("snapshot")?;
    let created_at: DateTime<Utc> = row.try_get("created_at")?;
    let expires_at: DateTime<Utc> = row.try_get("expires_at")?;

    Ok(snapshot.into_session(SessionId::from_uuid(id), created_at, expires_at))
}

#[async_trait]
impl SessionStore for PostgresSessionStore {
    #[instrument(skip(self, session), fields(user_id = %session.user_id), err)]
    async fn create(&self, session: NewSession) -> Result<SessionHandle, StoreError> {
        let id = SessionId::new();
        let created_at = self.clock.now();
        let expires_at = expiry(created_at, self.ttl)?;

        sqlx::query(
            r#"
            INSERT INTO auth_sessions (id, user_id, snapshot, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::from(id))
        .bind(Uuid::from(session.user_id))
        .bind(Json(&session))
        .bind(created_at)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("session.create", e))?;

        tracing::debug!(session = %id.redacted(), %expires_at, "session created");
        Ok(SessionHandle {
            session_id: id,
            expires_at,
        })
    }

    #[instrument(skip(self), fields(session = %id.redacted()), err)]
    async fn get(&self, id: SessionId) -> Result<Option<Session>, StoreError> {
        let row = sqlx::query(
            r#"
            WITH expired AS (
                DELETE FROM auth_sessions
                WHERE id = $1 AND expires_at < $2
                RETURNING id
            )
            SELECT id, snapshot, created_at, expires_at
            FROM auth_sessions
            WHERE id = $1 AND expires_at >= $2
            "#,
        )
        .bind(Uuid::from(id))
        .bind(self.clock.now())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("session.get", e))?;

        row.as_ref()
            .map(session_from_row)
            .transpose()
            .map_err(|e| map_sqlx_error("session.get", e))
    }

    #[instrument(skip(self), fields(session = %id.redacted()), err)]
    async fn destroy(&self, id: SessionId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(Uuid::from(id))
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("session.destroy", e))?;
        Ok(())
    }
}
