//! Startup reconciliation of the durable role mirror.
//!
//! Only explicit grants are written. Wildcards stay in configuration, so the
//! durable tables can never disagree with it about what a wildcard covers.

use std::collections::BTreeSet;

use courtside_auth::{Permission, Role, RoleConfig};

use crate::directory::Directory;
use crate::error::StoreError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub roles_mirrored: usize,
    pub grants_mirrored: usize,
    /// Roles present in storage but absent from configuration.
    pub stale_roles: BTreeSet<Role>,
    /// Stored permissions outside the configured catalogue.
    pub unknown_permissions: BTreeSet<Permission>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.stale_roles.is_empty() && self.unknown_permissions.is_empty()
    }
}

#[tracing::instrument(skip_all, err)]
pub async fn reconcile(directory: &dyn Directory, config: &RoleConfig) -> Result<ReconcileReport, StoreError> {
    let explicit = config.explicit_grants();
    directory.mirror_role_grants(&explicit).await?;

    let mirrored = directory.list_mirrored_grants().await?;
    let stale_roles: BTreeSet<Role> = mirrored
        .keys()
        .filter(|role| !config.roles.contains_key(*role))
        .cloned()
        .collect();

    let unknown_permissions: BTreeSet<Permission> = directory
        .list_known_permissions()
        .await?
        .into_iter()
        .filter(|p| !config.permissions.contains(p))
        .collect();

    let report = ReconcileReport {
        roles_mirrored: explicit.len(),
        grants_mirrored: explicit.values().map(BTreeSet::len).sum(),
        stale_roles,
        unknown_permissions,
    };

    for role in &report.stale_roles {
        tracing::warn!(%role, "stored role is not configured");
    }
    for permission in &report.unknown_permissions {
        tracing::warn!(%permission, "stored permission is missing from the configured catalogue");
    }
    tracing::info!(
        roles = report.roles_mirrored,
        grants = report.grants_mirrored,
        clean = report.is_clean(),
        "role mirror reconciled"
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::directory::InMemoryDirectory;

    const CONFIG: &str = r#"{
        "roles": {
            "OrgAdmin": ["teams.*", "org.members.manage"],
            "Viewer": ["teams.view"]
        },
        "permissions": ["teams.view", "teams.update", "org.members.manage"],
        "default_role": "Viewer",
        "default_permissions": ["teams.view"]
    }"#;

    #[tokio::test]
    async fn only_explicit_grants_are_mirrored() {
        let directory = InMemoryDirectory::new();
        let config = RoleConfig::from_json(CONFIG).unwrap();

        let report = reconcile(&directory, &config).await.unwrap();
        assert!(report.is_clean());
        assert_eq!(report.roles_mirrored, 2);
        assert_eq!(report.grants_mirrored, 2);

        let mirrored = directory.list_mirrored_grants().await.unwrap();
        assert_eq!(
            mirrored[&Role::from("OrgAdmin")],
            BTreeSet::from([Permission::from("org.members.manage")])
        );
        assert!(!mirrored.values().flatten().any(|p| p.as_str().contains('*')));
    }

    #[tokio::test]
    async fn drift_is_reported() {
        let directory = InMemoryDirectory::new();
        let config = RoleConfig::from_json(CONFIG).unwrap();

        directory
            .mirror_role_grants(&BTreeMap::from([(
                Role::from("Scout"),
                BTreeSet::from([Permission::from("scouting.reports.view")]),
            )]))
            .await
            .unwrap();

        let report = reconcile(&directory, &config).await.unwrap();
        assert_eq!(report.stale_roles, BTreeSet::from([Role::from("Scout")]));
        assert_eq!(
            report.unknown_permissions,
            BTreeSet::from([Permission::from("scouting.reports.view")])
        );
    }
}
