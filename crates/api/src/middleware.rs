use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, State},
    http::{HeaderMap, Request, header},
    middleware::Next,
    response::Response,
};

use courtside_auth::AccessError;
use courtside_core::SessionId;

use crate::app::errors;
use crate::app::services::AppState;
use crate::context::{ClientKey, SessionContext};

/// Resolve the session cookie into a [`SessionContext`].
///
/// Missing, malformed, unknown and expired session ids all leave the request
/// without a context; handlers that need one reject it with `401 no_session`.
/// Store failures are answered with `503` here.
pub async fn session_middleware(
    State(state): State<AppState>,
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Response {
    if let Some(id) = session_id_from_cookie(req.headers(), &state.cookie.name) {
        match state.access.session(id).await {
            Ok(session) => {
                req.extensions_mut().insert(SessionContext::new(session));
            }
            Err(AccessError::NoSession) => {}
            Err(err) => return errors::access_error(err),
        }
    }

    next.run(req).await
}

/// Fixed-window limiter for session-mutating routes, keyed by route and client.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let route = format!("{} {}", req.method(), req.uri().path());
    let client = client_key(
        req.headers(),
        req.extensions().get::<ConnectInfo<SocketAddr>>(),
        state.trust_forwarded_for,
    );

    let policy = state.rate_limit;
    let decision = match state
        .limiter
        .check(&route, client.as_str(), policy.window, policy.max)
        .await
    {
        Ok(decision) => decision,
        Err(err) => return errors::access_error(err.into()),
    };

    if !decision.allowed {
        let retry_after_secs = decision.retry_after_secs.unwrap_or(1);
        tracing::warn!(%route, client = client.as_str(), retry_after_secs, "rate limited");
        return errors::access_error(AccessError::RateLimited { retry_after_secs });
    }

    req.extensions_mut().insert(client);
    next.run(req).await
}

pub fn session_id_from_cookie(headers: &HeaderMap, name: &str) -> Option<SessionId> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .and_then(|(_, value)| value.trim().parse().ok())
}

/// The peer address, or the first `X-Forwarded-For` hop when a trusted proxy
/// sets that header.
fn client_key(headers: &HeaderMap, peer: Option<&ConnectInfo<SocketAddr>>, trust_forwarded_for: bool) -> ClientKey {
    let forwarded = headers
        .get("x-forwarded-for")
        .filter(|_| trust_forwarded_for)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    match (forwarded, peer) {
        (Some(ip), _) => ClientKey(ip.to_string()),
        (None, Some(ConnectInfo(addr))) => ClientKey(addr.ip().to_string()),
        (None, None) => ClientKey(ClientKey::UNKNOWN.to_string()),
    }
}
