use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use courtside_auth::{Permission, Role, Scope, ScopeMemberships, Session, User};
use courtside_core::{OrgId, UserId};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub token: String,
    #[serde(default)]
    pub org_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: UserId,
    pub email: String,
    pub display_name: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            display_name: user.display_name,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: UserResponse,
    pub expires_at: DateTime<Utc>,
    pub defaulted: bool,
}

/// Session snapshot as shown to its holder. The session id itself stays in the cookie.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user_id: UserId,
    pub roles: Vec<Role>,
    pub permissions: Vec<Permission>,
    pub explicit_permissions: Vec<Permission>,
    pub active_org_id: Option<OrgId>,
    pub memberships: ScopeMemberships,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl From<&Session> for SessionResponse {
    fn from(session: &Session) -> Self {
        Self {
            user_id: session.user_id,
            roles: session.roles.clone(),
            permissions: session.permissions.clone(),
            explicit_permissions: session.explicit_permissions.clone(),
            active_org_id: session.active_org_id.clone(),
            memberships: session.memberships.clone(),
            created_at: session.created_at,
            expires_at: session.expires_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CheckQuery {
    pub permission: String,
    pub scope_type: Option<String>,
    pub scope_id: Option<String>,
}

impl CheckQuery {
    /// Both halves of a scope must be given together.
    pub fn scope(&self) -> Result<Option<Scope>, &'static str> {
        match (self.scope_type.as_deref(), self.scope_id.as_deref()) {
            (None, None) => Ok(None),
            (Some(kind), Some(id)) => Ok(Some(Scope::new(kind, id))),
            _ => Err("scope_type and scope_id must be given together"),
        }
    }
}
