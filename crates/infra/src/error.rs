//! Storage error model shared by every backend.
//!
//! Any failure to talk to a durable store surfaces as [`StoreError`] and is
//! reported to callers as `AccessError::StoreUnavailable`, never as a denial.

use thiserror::Error;

use courtside_auth::AccessError;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend could not be reached or rejected the operation.
    #[error("store unavailable during {operation}: {message}")]
    Unavailable {
        operation: &'static str,
        message: String,
    },

    /// A stored record could not be decoded.
    #[error("corrupt record during {operation}: {message}")]
    Corrupt {
        operation: &'static str,
        message: String,
    },
}

impl StoreError {
    pub fn unavailable(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Unavailable {
            operation,
            message: message.into(),
        }
    }

    pub fn corrupt(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Corrupt {
            operation,
            message: message.into(),
        }
    }

    /// A poisoned in-memory lock: some earlier writer panicked mid-update.
    pub(crate) fn poisoned(operation: &'static str) -> Self {
        Self::unavailable(operation, "in-memory state lock poisoned")
    }
}

impl From<StoreError> for AccessError {
    fn from(err: StoreError) -> Self {
        AccessError::StoreUnavailable(err.to_string())
    }
}

/// Map SQLx errors onto [`StoreError`].
///
/// | SQLx error | StoreError |
/// |------------|------------|
/// | `ColumnDecode` / `Decode` / `ColumnNotFound` | `Corrupt` |
/// | everything else (database, pool, I/O, TLS) | `Unavailable` |
pub(crate) fn map_sqlx_error(operation: &'static str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) | sqlx::Error::ColumnNotFound(_) => {
            StoreError::corrupt(operation, err.to_string())
        }
        sqlx::Error::Database(db_err) => {
            let code = db_err.code().map(|c| c.to_string()).unwrap_or_default();
            StoreError::unavailable(operation, format!("database error [{code}]: {}", db_err.message()))
        }
        sqlx::Error::PoolClosed => StoreError::unavailable(operation, "connection pool closed"),
        other => StoreError::unavailable(operation, other.to_string()),
    }
}

#[cfg(feature = "redis")]
pub(crate) fn map_redis_error(operation: &'static str, err: redis::RedisError) -> StoreError {
    StoreError::unavailable(operation, err.to_string())
}
