use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{GrantPattern, Permission};

/// Role identifier used for RBAC.
///
/// Roles are opaque strings; what they grant is defined by [`RoleConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        Self(Cow::Owned(value))
    }
}

impl From<&'static str> for Role {
    fn from(value: &'static str) -> Self {
        Self(Cow::Borrowed(value))
    }
}

#[derive(Debug, Error)]
pub enum RoleConfigError {
    #[error("role configuration is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid role configuration: {0}")]
    Invalid(String),
}

/// Static role → grant configuration.
///
/// This is the single source of truth for wildcard semantics. Durable role
/// tables only ever mirror the *explicit* grants listed here (see
/// [`RoleConfig::explicit_grants`]), so configuration and storage cannot
/// disagree about what a wildcard means.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleConfig {
    /// Grants per role, in configuration order (order is significant for
    /// decision reason codes).
    pub roles: BTreeMap<Role, Vec<GrantPattern>>,

    /// Known permission catalogue that wildcards expand against.
    pub permissions: BTreeSet<Permission>,

    /// Role assigned when an identity has no membership.
    pub default_role: Role,

    /// Permissions snapshotted for the default role.
    pub default_permissions: Vec<Permission>,
}

impl RoleConfig {
    pub fn from_json(raw: &str) -> Result<Self, RoleConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), RoleConfigError> {
        for (role, grants) in &self.roles {
            if role.as_str().is_empty() {
                return Err(RoleConfigError::Invalid("role name must not be empty".into()));
            }
            for grant in grants {
                match grant {
                    GrantPattern::Exact(p) if p.as_str().is_empty() => {
                        return Err(RoleConfigError::Invalid(format!(
                            "role '{role}' has an empty grant"
                        )));
                    }
                    GrantPattern::Prefix(prefix) if prefix.is_empty() => {
                        return Err(RoleConfigError::Invalid(format!(
                            "role '{role}' has a wildcard grant with an empty prefix"
                        )));
                    }
                    _ => {}
                }
            }
        }

        if !self.roles.contains_key(&self.default_role) {
            return Err(RoleConfigError::Invalid(format!(
                "default role '{}' is not configured",
                self.default_role
            )));
        }

        Ok(())
    }

    pub fn grants_for(&self, role: &Role) -> &[GrantPattern] {
        self.roles.get(role).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Concrete permissions granted by `roles` (wildcards expanded against the catalogue).
    pub fn permissions_for<'a, I>(&self, roles: I) -> BTreeSet<Permission>
    where
        I: IntoIterator<Item = &'a Role>,
    {
        let grants = roles.into_iter().flat_map(|r| self.grants_for(r));
        crate::grant::expand(grants, &self.permissions)
    }

    /// Non-wildcard grants per role: the only part mirrored into durable storage.
    pub fn explicit_grants(&self) -> BTreeMap<Role, BTreeSet<Permission>> {
        self.roles
            .iter()
            .map(|(role, grants)| {
                let explicit = grants
                    .iter()
                    .filter_map(|g| match g {
                        GrantPattern::Exact(p) => Some(p.clone()),
                        _ => None,
                    })
                    .collect();
                (role.clone(), explicit)
            })
            .collect()
    }
}
