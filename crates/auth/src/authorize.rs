use serde::{Deserialize, Serialize};

use crate::scope::{Caller, Scope, allowed};
use crate::{AccessError, GrantPattern, Permission, Role, RoleConfig};

/// Everything needed to decide one permission check.
///
/// Construction is decoupled from storage and transport: the API builds this
/// from a session snapshot, workers can build it from anything else.
#[derive(Debug, Clone, Copy)]
pub struct AccessRequest<'a> {
    pub permission: &'a str,
    /// Roles in the caller's resolved order; grant discovery follows it.
    pub roles: &'a [Role],
    /// Resolved permission snapshot, consulted after role grants as exact grants.
    pub permissions: &'a [Permission],
    /// Identity-level grants; checked first and never expanded.
    pub explicit_permissions: &'a [Permission],
    pub scope: Option<&'a Scope>,
    pub caller: Option<&'a Caller<'a>>,
}

/// Machine-readable reason for a decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ReasonCode {
    ExplicitPermission,
    GrantedBy(String),
    ScopeDenied,
    MissingPermission,
}

impl core::fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::ExplicitPermission => f.write_str("explicit_permission"),
            Self::GrantedBy(grant) => write!(f, "granted_by:{grant}"),
            Self::ScopeDenied => f.write_str("scope_denied"),
            Self::MissingPermission => f.write_str("missing_permission"),
        }
    }
}

impl From<ReasonCode> for String {
    fn from(value: ReasonCode) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for ReasonCode {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "explicit_permission" => Ok(Self::ExplicitPermission),
            "scope_denied" => Ok(Self::ScopeDenied),
            "missing_permission" => Ok(Self::MissingPermission),
            other => other
                .strip_prefix("granted_by:")
                .map(|grant| Self::GrantedBy(grant.to_string()))
                .ok_or_else(|| format!("unknown reason code '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub allow: bool,
    pub reason: ReasonCode,
}

impl Decision {
    fn allow(reason: ReasonCode) -> Self {
        Self { allow: true, reason }
    }

    fn deny(reason: ReasonCode) -> Self {
        Self {
            allow: false,
            reason,
        }
    }

    /// Turn a denial into the matching [`AccessError`].
    pub fn into_result(self, permission: &str, scope: Option<&Scope>) -> Result<Self, AccessError> {
        match (self.allow, &self.reason) {
            (true, _) => Ok(self),
            (false, ReasonCode::ScopeDenied) => Err(AccessError::ScopeDenied {
                permission: permission.to_string(),
                scope: scope.cloned(),
            }),
            (false, _) => Err(AccessError::MissingPermission {
                permission: permission.to_string(),
            }),
        }
    }
}

/// Decide whether a request is allowed.
///
/// Order (first match wins):
/// 1. an explicit identity permission whose scope check passes
/// 2. the first candidate grant covering the permission: role grants in role
///    order then configuration order, then the permission snapshot. A scope
///    failure on that first match is final; later grants are not consulted.
/// 3. otherwise `missing_permission`
///
/// - No IO
/// - No panics
pub fn decide(config: &RoleConfig, request: &AccessRequest<'_>) -> Decision {
    let permission = request.permission;
    let scope_ok = || allowed(request.scope, request.caller);

    if request
        .explicit_permissions
        .iter()
        .any(|p| p.as_str() == permission)
        && scope_ok()
    {
        return Decision::allow(ReasonCode::ExplicitPermission);
    }

    let role_grants = request
        .roles
        .iter()
        .flat_map(|role| config.grants_for(role).iter().cloned());
    let snapshot_grants = request
        .permissions
        .iter()
        .map(|p| GrantPattern::Exact(p.clone()));

    let first_match = role_grants
        .chain(snapshot_grants)
        .find(|grant| grant.grants(permission, &config.permissions));

    match first_match {
        Some(grant) if scope_ok() => Decision::allow(ReasonCode::GrantedBy(grant.to_string())),
        Some(grant) => {
            tracing::debug!(%permission, %grant, "matching grant failed its scope check");
            Decision::deny(ReasonCode::ScopeDenied)
        }
        None => Decision::deny(ReasonCode::MissingPermission),
    }
}
