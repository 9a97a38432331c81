use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;

use courtside_auth::{DirectGrants, MembershipRecord, Permission, Role, User, VerifiedIdentity};
use courtside_core::{OrgId, TeamId, UserId};

use super::{Directory, RoleGrants};
use crate::error::StoreError;

#[derive(Debug, Default)]
struct DirectoryState {
    users: HashMap<UserId, User>,
    by_external_id: HashMap<String, UserId>,
    memberships: HashMap<UserId, Vec<MembershipRecord>>,
    direct: HashMap<UserId, DirectGrants>,
    known_permissions: BTreeSet<Permission>,
    mirrored: RoleGrants,
}

/// Process-local directory.
///
/// Starts empty, so every identity resolves to the configured default until
/// memberships are granted through the seeding helpers. Intended for
/// tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    state: RwLock<DirectoryState>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `roles` and `teams` to the user's membership in `org`.
    pub fn grant_membership(
        &self,
        user_id: UserId,
        org: &OrgId,
        roles: &[Role],
        teams: &[TeamId],
    ) -> Result<(), StoreError> {
        let mut state = self.write("directory.grant_membership")?;
        let memberships = state.memberships.entry(user_id).or_default();

        let record = match memberships.iter().position(|m| &m.org_id == org) {
            Some(idx) => &mut memberships[idx],
            None => {
                memberships.push(MembershipRecord {
                    org_id: org.clone(),
                    roles: Vec::new(),
                    team_ids: Vec::new(),
                });
                let last = memberships.len() - 1;
                &mut memberships[last]
            }
        };

        for role in roles {
            if !record.roles.contains(role) {
                record.roles.push(role.clone());
            }
        }
        for team in teams {
            if !record.team_ids.contains(team) {
                record.team_ids.push(team.clone());
            }
        }
        Ok(())
    }

    pub fn grant_permission(&self, user_id: UserId, permission: Permission) -> Result<(), StoreError> {
        let mut state = self.write("directory.grant_permission")?;
        let direct = state.direct.entry(user_id).or_default();
        if !direct.permissions.contains(&permission) {
            direct.permissions.push(permission);
        }
        Ok(())
    }

    pub fn grant_platform_scope(&self, user_id: UserId, scope_id: impl Into<String>) -> Result<(), StoreError> {
        let scope_id = scope_id.into();
        let mut state = self.write("directory.grant_platform_scope")?;
        let direct = state.direct.entry(user_id).or_default();
        if !direct.platform_scopes.contains(&scope_id) {
            direct.platform_scopes.push(scope_id);
        }
        Ok(())
    }

    /// Add permissions to the stored catalogue without touching role grants.
    pub fn register_permissions<I>(&self, permissions: I) -> Result<(), StoreError>
    where
        I: IntoIterator<Item = Permission>,
    {
        let mut state = self.write("directory.register_permissions")?;
        state.known_permissions.extend(permissions);
        Ok(())
    }

    fn read(&self, operation: &'static str) -> Result<std::sync::RwLockReadGuard<'_, DirectoryState>, StoreError> {
        self.state.read().map_err(|_| StoreError::poisoned(operation))
    }

    fn write(&self, operation: &'static str) -> Result<std::sync::RwLockWriteGuard<'_, DirectoryState>, StoreError> {
        self.state.write().map_err(|_| StoreError::poisoned(operation))
    }
}

#[async_trait]
impl Directory for InMemoryDirectory {
    async fn upsert_user(&self, identity: &VerifiedIdentity) -> Result<User, StoreError> {
        let mut state = self.write("directory.upsert_user")?;

        let id = match state.by_external_id.get(&identity.uid).copied() {
            Some(id) => id,
            None => {
                let id = UserId::new();
                state.by_external_id.insert(identity.uid.clone(), id);
                id
            }
        };

        let user = User::from_identity(id, identity);
        state.users.insert(id, user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.read("directory.get_user")?.users.get(&id).cloned())
    }

    async fn list_memberships(
        &self,
        user_id: UserId,
        org: Option<&OrgId>,
    ) -> Result<Vec<MembershipRecord>, StoreError> {
        let state = self.read("directory.list_memberships")?;
        let Some(memberships) = state.memberships.get(&user_id) else {
            return Ok(Vec::new());
        };

        Ok(memberships
            .iter()
            .filter(|m| !m.roles.is_empty())
            .filter(|m| org.is_none_or(|org| &m.org_id == org))
            .cloned()
            .collect())
    }

    async fn ensure_default_membership(
        &self,
        user_id: UserId,
        org: &OrgId,
        role: &Role,
    ) -> Result<bool, StoreError> {
        let mut state = self.write("directory.ensure_default_membership")?;
        let memberships = state.memberships.entry(user_id).or_default();

        if memberships.iter().any(|m| &m.org_id == org && !m.roles.is_empty()) {
            return Ok(false);
        }

        match memberships.iter_mut().find(|m| &m.org_id == org) {
            Some(existing) => existing.roles.push(role.clone()),
            None => memberships.push(MembershipRecord {
                org_id: org.clone(),
                roles: vec![role.clone()],
                team_ids: Vec::new(),
            }),
        }
        Ok(true)
    }

    async fn direct_grants(&self, user_id: UserId) -> Result<DirectGrants, StoreError> {
        let state = self.read("directory.direct_grants")?;
        Ok(state.direct.get(&user_id).cloned().unwrap_or_default())
    }

    async fn list_known_permissions(&self) -> Result<BTreeSet<Permission>, StoreError> {
        Ok(self.read("directory.list_known_permissions")?.known_permissions.clone())
    }

    async fn mirror_role_grants(&self, grants: &RoleGrants) -> Result<(), StoreError> {
        let mut state = self.write("directory.mirror_role_grants")?;
        for (role, permissions) in grants {
            state.known_permissions.extend(permissions.iter().cloned());
            state.mirrored.insert(role.clone(), permissions.clone());
        }
        Ok(())
    }

    async fn list_mirrored_grants(&self) -> Result<RoleGrants, StoreError> {
        Ok(self.read("directory.list_mirrored_grants")?.mirrored.clone())
    }
}
