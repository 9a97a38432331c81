//! Turning membership records into a resolved authorization state.
//!
//! Pure: the caller loads memberships and direct grants from whatever store
//! is configured and hands them in.

use serde::{Deserialize, Serialize};

use courtside_core::{OrgId, TeamId};

use crate::scope::ScopeMemberships;
use crate::{Permission, Role, RoleConfig};

/// A user's roles within one organization, plus the teams they belong to there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipRecord {
    pub org_id: OrgId,
    pub roles: Vec<Role>,
    #[serde(default)]
    pub team_ids: Vec<TeamId>,
}

/// Grants attached directly to an identity, outside any membership.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectGrants {
    pub permissions: Vec<Permission>,
    pub platform_scopes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedAuthorization {
    pub roles: Vec<Role>,
    pub permissions: Vec<Permission>,
    pub explicit_permissions: Vec<Permission>,
    pub active_org_id: Option<OrgId>,
    pub memberships: ScopeMemberships,
    /// True when no membership existed and the configured default was used.
    pub defaulted: bool,
}

impl ResolvedAuthorization {
    /// The fixed default for identities without any membership.
    pub fn default_for(config: &RoleConfig, requested_org: Option<&OrgId>) -> Self {
        Self {
            roles: vec![config.default_role.clone()],
            permissions: config.default_permissions.clone(),
            explicit_permissions: Vec::new(),
            active_org_id: requested_org.cloned(),
            memberships: ScopeMemberships::default(),
            defaulted: true,
        }
    }
}

/// Resolve roles, permissions and scopes from membership records.
///
/// Permissions come from the static role configuration, never from durable
/// role tables. Roles, organizations and teams keep first-seen order.
pub fn resolve_memberships(
    config: &RoleConfig,
    memberships: &[MembershipRecord],
    direct: DirectGrants,
    requested_org: Option<&OrgId>,
) -> ResolvedAuthorization {
    if memberships.is_empty() {
        let mut resolved = ResolvedAuthorization::default_for(config, requested_org);
        resolved.explicit_permissions = direct.permissions;
        resolved.memberships.platform = direct.platform_scopes;
        return resolved;
    }

    let mut roles: Vec<Role> = Vec::new();
    let mut organizations: Vec<OrgId> = Vec::new();
    let mut teams: Vec<TeamId> = Vec::new();

    for membership in memberships {
        push_unique(&mut organizations, &membership.org_id);
        for role in &membership.roles {
            push_unique(&mut roles, role);
        }
        for team in &membership.team_ids {
            push_unique(&mut teams, team);
        }
    }

    let permissions = config.permissions_for(&roles).into_iter().collect();
    let active_org_id = requested_org
        .cloned()
        .or_else(|| organizations.first().cloned());

    ResolvedAuthorization {
        roles,
        permissions,
        explicit_permissions: direct.permissions,
        active_org_id,
        memberships: ScopeMemberships {
            platform: direct.platform_scopes,
            organizations,
            teams,
        },
        defaulted: false,
    }
}

fn push_unique<T: Clone + PartialEq>(items: &mut Vec<T>, item: &T) {
    if !items.contains(item) {
        items.push(item.clone());
    }
}
