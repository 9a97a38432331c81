use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::app::dto::CheckQuery;
use crate::app::errors;
use crate::app::services::AppState;
use crate::authz;
use crate::context::SessionContext;

/// GET /authz/check - decide one permission for the caller's session.
///
/// `200` with the decision when allowed, a structured `403` otherwise.
pub async fn check(
    State(state): State<AppState>,
    ctx: SessionContext,
    Query(query): Query<CheckQuery>,
) -> Response {
    let scope = match query.scope() {
        Ok(scope) => scope,
        Err(message) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_scope", message),
    };

    match authz::require_permission(&state.access, &ctx, &query.permission, scope.as_ref()) {
        Ok(decision) => {
            tracing::debug!(
                user_id = %ctx.user_id(),
                permission = %query.permission,
                reason = %decision.reason,
                "access granted"
            );
            (StatusCode::OK, Json(decision)).into_response()
        }
        Err(refusal) => refusal,
    }
}
