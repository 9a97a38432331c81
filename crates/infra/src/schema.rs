//! Schema bootstrap for the durable backend.

use sqlx::PgPool;

use crate::error::{StoreError, map_sqlx_error};

const ACCESS_SCHEMA: &str = include_str!("../migrations/0001_access.sql");

/// Apply the access schema. Every statement is idempotent.
#[tracing::instrument(skip_all, err)]
pub async fn ensure_schema(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::raw_sql(ACCESS_SCHEMA)
        .execute(pool)
        .await
        .map_err(|e| map_sqlx_error("schema.ensure", e))?;
    tracing::info!("access schema ready");
    Ok(())
}
