use thiserror::Error;

use crate::Scope;

/// Refusals and failures surfaced at the access-control boundary.
///
/// Denials (`MissingPermission`, `ScopeDenied`) are security signals;
/// `StoreUnavailable` is an availability signal. They are never folded into
/// each other.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AccessError {
    #[error("identity could not be verified")]
    InvalidIdentity,

    #[error("forbidden: missing permission '{permission}'")]
    MissingPermission { permission: String },

    #[error("forbidden: permission '{permission}' denied for the requested scope")]
    ScopeDenied {
        permission: String,
        scope: Option<Scope>,
    },

    /// Expired and unknown sessions are deliberately indistinguishable.
    #[error("no session")]
    NoSession,

    #[error("rate limited; retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
}

impl AccessError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidIdentity => "invalid_identity",
            Self::MissingPermission { .. } => "missing_permission",
            Self::ScopeDenied { .. } => "scope_denied",
            Self::NoSession => "no_session",
            Self::RateLimited { .. } => "rate_limited",
            Self::StoreUnavailable(_) => "store_unavailable",
        }
    }

    pub fn is_denial(&self) -> bool {
        matches!(self, Self::MissingPermission { .. } | Self::ScopeDenied { .. })
    }
}
