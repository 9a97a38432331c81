//! Loads authorization inputs from the directory and resolves them.

use std::sync::Arc;

use courtside_auth::{ResolvedAuthorization, RoleConfig, resolve_memberships};
use courtside_core::{OrgId, UserId};

use crate::directory::Directory;
use crate::error::StoreError;

#[derive(Clone)]
pub struct AuthorizationResolver {
    directory: Arc<dyn Directory>,
    config: Arc<RoleConfig>,
}

impl AuthorizationResolver {
    pub fn new(directory: Arc<dyn Directory>, config: Arc<RoleConfig>) -> Self {
        Self { directory, config }
    }

    pub fn config(&self) -> &RoleConfig {
        &self.config
    }

    /// Resolve roles, permissions and scopes for `user_id`.
    ///
    /// Permissions derive from the static role configuration; the directory
    /// only supplies memberships and direct grants.
    #[tracing::instrument(skip(self), fields(user_id = %user_id, org_id = ?org), err)]
    pub async fn resolve(&self, user_id: UserId, org: Option<&OrgId>) -> Result<ResolvedAuthorization, StoreError> {
        let memberships = self.directory.list_memberships(user_id, org).await?;
        let direct = self.directory.direct_grants(user_id).await?;

        let resolved = resolve_memberships(&self.config, &memberships, direct, org);
        if resolved.defaulted {
            tracing::debug!(default_role = %self.config.default_role, "no membership found; using default role");
        }
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use courtside_auth::{Permission, Role};
    use courtside_core::TeamId;

    use super::*;
    use crate::config::BUNDLED_ROLE_CONFIG;
    use crate::directory::InMemoryDirectory;

    fn resolver() -> (Arc<InMemoryDirectory>, AuthorizationResolver) {
        let directory = Arc::new(InMemoryDirectory::new());
        let config = Arc::new(RoleConfig::from_json(BUNDLED_ROLE_CONFIG).unwrap());
        (directory.clone(), AuthorizationResolver::new(directory, config))
    }

    #[tokio::test]
    async fn empty_directory_yields_the_default() {
        let (_, resolver) = resolver();
        let org = OrgId::from("org_9");
        let resolved = resolver.resolve(UserId::new(), Some(&org)).await.unwrap();

        assert!(resolved.defaulted);
        assert_eq!(resolved.roles, vec![Role::from("Viewer")]);
        assert_eq!(resolved.permissions, vec![Permission::from("teams.view")]);
        assert_eq!(resolved.active_org_id, Some(org));
    }

    #[tokio::test]
    async fn wildcard_roles_expand_against_the_configured_catalogue() {
        let (directory, resolver) = resolver();
        let user = UserId::new();
        directory
            .grant_membership(user, &OrgId::from("org_1"), &[Role::from("OrgAdmin")], &[TeamId::from("team_a")])
            .unwrap();

        let resolved = resolver.resolve(user, None).await.unwrap();
        assert!(!resolved.defaulted);
        assert!(resolved.permissions.contains(&Permission::from("teams.function.create")));
        assert!(!resolved.permissions.contains(&Permission::from("billing.view")));
        assert_eq!(resolved.memberships.teams, vec![TeamId::from("team_a")]);
        assert_eq!(resolved.active_org_id, Some(OrgId::from("org_1")));
    }

    #[tokio::test]
    async fn requested_org_without_membership_falls_back_to_default() {
        let (directory, resolver) = resolver();
        let user = UserId::new();
        directory
            .grant_membership(user, &OrgId::from("org_1"), &[Role::from("OrgAdmin")], &[])
            .unwrap();

        let other = OrgId::from("org_2");
        let resolved = resolver.resolve(user, Some(&other)).await.unwrap();
        assert!(resolved.defaulted);
        assert_eq!(resolved.active_org_id, Some(other));
    }
}
