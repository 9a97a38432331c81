//! Request-time scope constraints and the scope evaluator.

use serde::{Deserialize, Serialize};

use courtside_core::{OrgId, TeamId, UserId};

/// Kind of scope a permission check is narrowed to.
///
/// Unknown kinds are kept (not rejected at parse time) so that evaluation can
/// fail closed on them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ScopeKind {
    Platform,
    Organization,
    Team,
    /// Satisfied only by the caller's own user id.
    SelfScope,
    Unrecognized(String),
}

impl ScopeKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Platform => "platform",
            Self::Organization => "organization",
            Self::Team => "team",
            Self::SelfScope => "self",
            Self::Unrecognized(other) => other,
        }
    }
}

impl From<&str> for ScopeKind {
    fn from(value: &str) -> Self {
        match value {
            "platform" => Self::Platform,
            "organization" => Self::Organization,
            "team" => Self::Team,
            "self" => Self::SelfScope,
            other => Self::Unrecognized(other.to_string()),
        }
    }
}

impl From<String> for ScopeKind {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<ScopeKind> for String {
    fn from(value: ScopeKind) -> Self {
        value.as_str().to_string()
    }
}

impl core::fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scope {
    #[serde(rename = "type")]
    pub kind: ScopeKind,
    pub id: String,
}

impl Scope {
    pub fn new(kind: impl Into<ScopeKind>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
        }
    }

    pub fn organization(org_id: &OrgId) -> Self {
        Self::new(ScopeKind::Organization, org_id.as_str())
    }

    pub fn team(team_id: &TeamId) -> Self {
        Self::new(ScopeKind::Team, team_id.as_str())
    }

    pub fn own(user_id: UserId) -> Self {
        Self::new(ScopeKind::SelfScope, user_id.to_string())
    }

    pub fn platform(id: impl Into<String>) -> Self {
        Self::new(ScopeKind::Platform, id)
    }
}

impl core::fmt::Display for Scope {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// Scope memberships known for a caller.
///
/// Vectors keep discovery order; the first organization is the fallback
/// active organization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeMemberships {
    /// Platform-level scope grants (`"*"` covers every platform scope).
    pub platform: Vec<String>,
    pub organizations: Vec<OrgId>,
    pub teams: Vec<TeamId>,
}

/// The caller a scope is evaluated against.
#[derive(Debug, Clone, Copy)]
pub struct Caller<'a> {
    pub id: UserId,
    pub memberships: &'a ScopeMemberships,
}

impl<'a> Caller<'a> {
    pub fn new(id: UserId, memberships: &'a ScopeMemberships) -> Self {
        Self { id, memberships }
    }
}

/// Evaluate a scope constraint for a caller.
///
/// - no scope: unscoped check, always allowed
/// - scope without a caller: denied
/// - unknown scope kinds: denied
pub fn allowed(scope: Option<&Scope>, caller: Option<&Caller<'_>>) -> bool {
    let Some(scope) = scope else {
        return true;
    };
    let Some(caller) = caller else {
        return false;
    };

    let m = caller.memberships;
    match &scope.kind {
        ScopeKind::SelfScope => caller.id.to_string() == scope.id,
        ScopeKind::Organization => m.organizations.iter().any(|o| o.as_str() == scope.id),
        ScopeKind::Team => m.teams.iter().any(|t| t.as_str() == scope.id),
        ScopeKind::Platform => m.platform.iter().any(|p| p == "*" || *p == scope.id),
        ScopeKind::Unrecognized(_) => false,
    }
}
