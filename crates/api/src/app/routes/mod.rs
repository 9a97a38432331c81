use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};

use crate::app::services::AppState;
use crate::middleware;

pub mod check;
pub mod session;
pub mod system;

/// Session and permission-check endpoints.
///
/// Login and logout pass through the mutation rate limiter; reading the
/// session does not.
pub fn router(state: AppState) -> Router<AppState> {
    let rate_limited = from_fn_with_state(state, middleware::rate_limit_middleware);

    Router::new()
        .route(
            "/auth/session",
            post(session::login)
                .delete(session::logout)
                .layer(rate_limited)
                .get(session::current),
        )
        .route("/authz/check", get(check::check))
}
