use axum::http::{HeaderValue, StatusCode, header};
use axum::response::IntoResponse;
use serde_json::json;

use courtside_auth::{AccessError, ReasonCode, Scope};

/// Map an [`AccessError`] onto its HTTP response.
///
/// | AccessError | status | body `error` |
/// |-------------|--------|--------------|
/// | `InvalidIdentity` | 401 | `invalid_identity` |
/// | `NoSession` | 401 | `no_session` |
/// | `MissingPermission` / `ScopeDenied` | 403 | structured refusal |
/// | `RateLimited` | 429 + `Retry-After` | `rate_limited` |
/// | `StoreUnavailable` | 503 | `store_unavailable` |
pub fn access_error(err: AccessError) -> axum::response::Response {
    match &err {
        AccessError::InvalidIdentity | AccessError::NoSession => {
            json_error(StatusCode::UNAUTHORIZED, err.code(), err.to_string())
        }
        AccessError::MissingPermission { permission } => refusal(permission, None, ReasonCode::MissingPermission, &err),
        AccessError::ScopeDenied { permission, scope } => {
            refusal(permission, scope.as_ref(), ReasonCode::ScopeDenied, &err)
        }
        AccessError::RateLimited { retry_after_secs } => {
            let mut response = (
                StatusCode::TOO_MANY_REQUESTS,
                axum::Json(json!({
                    "error": err.code(),
                    "message": err.to_string(),
                    "retry_after_secs": retry_after_secs,
                })),
            )
                .into_response();
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(*retry_after_secs));
            response
        }
        AccessError::StoreUnavailable(message) => {
            tracing::error!(error = %message, "store unavailable");
            json_error(StatusCode::SERVICE_UNAVAILABLE, err.code(), "backing store unavailable")
        }
    }
}

fn refusal(
    permission: &str,
    scope: Option<&Scope>,
    reason: ReasonCode,
    err: &AccessError,
) -> axum::response::Response {
    (
        StatusCode::FORBIDDEN,
        axum::Json(json!({
            "error": err.code(),
            "message": err.to_string(),
            "permission": permission,
            "scope": scope,
            "reason": reason,
        })),
    )
        .into_response()
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_the_error_taxonomy() {
        let cases = [
            (AccessError::InvalidIdentity, StatusCode::UNAUTHORIZED),
            (AccessError::NoSession, StatusCode::UNAUTHORIZED),
            (
                AccessError::MissingPermission {
                    permission: "teams.create".into(),
                },
                StatusCode::FORBIDDEN,
            ),
            (
                AccessError::ScopeDenied {
                    permission: "teams.create".into(),
                    scope: Some(Scope::new("organization", "org_2")),
                },
                StatusCode::FORBIDDEN,
            ),
            (AccessError::RateLimited { retry_after_secs: 7 }, StatusCode::TOO_MANY_REQUESTS),
            (AccessError::StoreUnavailable("down".into()), StatusCode::SERVICE_UNAVAILABLE),
        ];

        for (err, status) in cases {
            assert_eq!(access_error(err).status(), status);
        }
    }

    #[test]
    fn rate_limited_carries_retry_after() {
        let response = access_error(AccessError::RateLimited { retry_after_secs: 7 });
        assert_eq!(response.headers()[header::RETRY_AFTER], "7");
    }
}
