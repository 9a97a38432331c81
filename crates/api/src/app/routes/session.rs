use axum::{
    Json,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};

use courtside_core::{OrgId, SessionId};

use crate::app::dto::{LoginRequest, LoginResponse, SessionResponse};
use crate::app::errors;
use crate::app::services::{AppState, CookieSettings};
use crate::context::SessionContext;
use crate::middleware::session_id_from_cookie;

/// POST /auth/session - verify an identity token and open a session.
pub async fn login(State(state): State<AppState>, Json(body): Json<LoginRequest>) -> Response {
    let org = body.org_id.filter(|o| !o.trim().is_empty()).map(OrgId::from);

    let outcome = match state.access.login(&body.token, org.as_ref()).await {
        Ok(outcome) => outcome,
        Err(err) => return errors::access_error(err),
    };

    let cookie = session_cookie(&state.cookie, Some(outcome.handle.session_id));
    let body = LoginResponse {
        user: outcome.user.into(),
        expires_at: outcome.handle.expires_at,
        defaulted: outcome.defaulted,
    };

    with_cookie(cookie, (StatusCode::CREATED, Json(body)).into_response())
}

/// GET /auth/session - the caller's session snapshot.
pub async fn current(ctx: SessionContext) -> Json<SessionResponse> {
    Json(SessionResponse::from(ctx.session()))
}

/// DELETE /auth/session - end the session. Succeeds whether or not one existed.
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(id) = session_id_from_cookie(&headers, &state.cookie.name) {
        if let Err(err) = state.access.logout(id).await {
            return errors::access_error(err);
        }
    }

    let cookie = session_cookie(&state.cookie, None);
    with_cookie(cookie, StatusCode::NO_CONTENT.into_response())
}

/// `Set-Cookie` value carrying `id`, or clearing the cookie when `id` is `None`.
fn session_cookie(settings: &CookieSettings, id: Option<SessionId>) -> String {
    let (value, max_age) = match id {
        Some(id) => (id.to_string(), settings.max_age.num_seconds().max(0)),
        None => (String::new(), 0),
    };

    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        settings.name, value, max_age
    );
    if settings.secure {
        cookie.push_str("; Secure");
    }
    cookie
}

fn with_cookie(cookie: String, mut response: Response) -> Response {
    match HeaderValue::from_str(&cookie) {
        Ok(value) => {
            response.headers_mut().insert(header::SET_COOKIE, value);
            response
        }
        Err(_) => errors::json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "invalid_cookie",
            "session cookie could not be encoded",
        ),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn settings(secure: bool) -> CookieSettings {
        CookieSettings {
            name: "courtside_sid".into(),
            secure,
            max_age: Duration::minutes(15),
        }
    }

    #[test]
    fn session_cookie_is_http_only_and_bounded() {
        let id = SessionId::new();
        let cookie = session_cookie(&settings(false), Some(id));
        assert!(cookie.starts_with(&format!("courtside_sid={id};")));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Max-Age=900"));
        assert!(!cookie.contains("Secure"));
    }

    #[test]
    fn clearing_cookie_expires_immediately() {
        let cookie = session_cookie(&settings(true), None);
        assert!(cookie.starts_with("courtside_sid=;"));
        assert!(cookie.contains("Max-Age=0"));
        assert!(cookie.ends_with("; Secure"));
    }
}
