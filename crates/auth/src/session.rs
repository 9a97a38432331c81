//! Session snapshot types.
//!
//! A session freezes the authorization state resolved at login. It is never
//! re-resolved or extended; it lives until its fixed expiry or until logout.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use courtside_core::{OrgId, SessionId, UserId};

use crate::authorize::AccessRequest;
use crate::resolution::ResolvedAuthorization;
use crate::scope::{Caller, Scope, ScopeMemberships};
use crate::{Permission, Role};

/// Input to session creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSession {
    pub user_id: UserId,
    pub roles: Vec<Role>,
    pub permissions: Vec<Permission>,
    #[serde(default)]
    pub explicit_permissions: Vec<Permission>,
    pub active_org_id: Option<OrgId>,
    #[serde(default)]
    pub memberships: ScopeMemberships,
}

impl NewSession {
    pub fn from_resolution(user_id: UserId, resolved: ResolvedAuthorization) -> Self {
        Self {
            user_id,
            roles: resolved.roles,
            permissions: resolved.permissions,
            explicit_permissions: resolved.explicit_permissions,
            active_org_id: resolved.active_org_id,
            memberships: resolved.memberships,
        }
    }

    pub fn into_session(self, id: SessionId, created_at: DateTime<Utc>, expires_at: DateTime<Utc>) -> Session {
        Session {
            id,
            user_id: self.user_id,
            roles: self.roles,
            permissions: self.permissions,
            explicit_permissions: self.explicit_permissions,
            active_org_id: self.active_org_id,
            memberships: self.memberships,
            created_at,
            expires_at,
        }
    }
}

/// What the caller gets back from session creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionHandle {
    pub session_id: SessionId,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub user_id: UserId,
    pub roles: Vec<Role>,
    pub permissions: Vec<Permission>,
    pub explicit_permissions: Vec<Permission>,
    pub active_org_id: Option<OrgId>,
    pub memberships: ScopeMemberships,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Expired strictly after `expires_at`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            session_id: self.id,
            expires_at: self.expires_at,
        }
    }

    pub fn caller(&self) -> Caller<'_> {
        Caller::new(self.user_id, &self.memberships)
    }

    /// Build an engine request for this session's snapshot.
    pub fn access_request<'a>(
        &'a self,
        permission: &'a str,
        scope: Option<&'a Scope>,
        caller: &'a Caller<'a>,
    ) -> AccessRequest<'a> {
        AccessRequest {
            permission,
            roles: &self.roles,
            permissions: &self.permissions,
            explicit_permissions: &self.explicit_permissions,
            scope,
            caller: Some(caller),
        }
    }
}
