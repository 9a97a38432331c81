//! API-side permission gate.
//!
//! Handlers call [`require_permission`] before doing any work. A denial
//! becomes a structured `403` refusal carrying the permission, the scope and
//! the engine's reason code.

use axum::response::Response;

use courtside_auth::{Decision, Scope};
use courtside_infra::AccessService;

use crate::app::errors;
use crate::context::SessionContext;

pub fn require_permission(
    access: &AccessService,
    ctx: &SessionContext,
    permission: &str,
    scope: Option<&Scope>,
) -> Result<Decision, Response> {
    access
        .require(ctx.session(), permission, scope)
        .map_err(errors::access_error)
}
