use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::response::Response;

use courtside_auth::{AccessError, Session};
use courtside_core::UserId;

use crate::app::errors;

/// Live session for a request.
///
/// Inserted by the session middleware when the request carries a valid
/// session cookie. Extracting it on a request without one yields `401
/// no_session`.
#[derive(Debug, Clone)]
pub struct SessionContext {
    session: Arc<Session>,
}

impl SessionContext {
    pub fn new(session: Session) -> Self {
        Self {
            session: Arc::new(session),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn user_id(&self) -> UserId {
        self.session.user_id
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for SessionContext
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SessionContext>()
            .cloned()
            .ok_or_else(|| errors::access_error(AccessError::NoSession))
    }
}

/// Rate-limit key for the caller: the peer address, or the first
/// `X-Forwarded-For` hop behind a trusted proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientKey(pub String);

impl ClientKey {
    pub const UNKNOWN: &'static str = "unknown";

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
