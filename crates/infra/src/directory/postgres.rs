//! Postgres-backed directory.
//!
//! Tables are created by `migrations/0001_access.sql`. Discovery order of
//! memberships, teams and direct grants follows the `ordinal` column.
//!
//! ## Error Mapping
//!
//! All SQLx failures go through [`map_sqlx_error`] and surface as
//! `StoreError::Unavailable` (or `Corrupt` for undecodable rows). Nothing is
//! retried here.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use courtside_auth::{DirectGrants, MembershipRecord, Permission, Role, User, VerifiedIdentity};
use courtside_core::{OrgId, TeamId, UserId};

use super::{Directory, RoleGrants};
use crate::error::{StoreError, map_sqlx_error};

#[derive(Debug, Clone)]
pub struct PostgresDirectory {
    pool: PgPool,
}

impl PostgresDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Add `role` (and optionally `team`) to the user's membership in `org`.
    #[instrument(skip(self), fields(user_id = %user_id, org_id = %org), err)]
    pub async fn grant_membership(
        &self,
        user_id: UserId,
        org: &OrgId,
        role: &Role,
        team: Option<&TeamId>,
    ) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("directory.grant_membership", e))?;

        sqlx::query(
            r#"
            INSERT INTO memberships (user_id, org_id, role)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, org_id, role) DO NOTHING
            "#,
        )
        .bind(Uuid::from(user_id))
        .bind(org.as_str())
        .bind(role.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("directory.grant_membership", e))?;

        if let Some(team) = team {
            sqlx::query(
                r#"
                INSERT INTO team_members (user_id, org_id, team_id)
                VALUES ($1, $2, $3)
                ON CONFLICT (user_id, org_id, team_id) DO NOTHING
                "#,
            )
            .bind(Uuid::from(user_id))
            .bind(org.as_str())
            .bind(team.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("directory.grant_membership", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("directory.grant_membership", e))
    }

    #[instrument(skip(self), fields(user_id = %user_id), err)]
    pub async fn grant_permission(&self, user_id: UserId, permission: &Permission) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO user_permissions (user_id, permission)
            VALUES ($1, $2)
            ON CONFLICT (user_id, permission) DO NOTHING
            "#,
        )
        .bind(Uuid::from(user_id))
        .bind(permission.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("directory.grant_permission", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(user_id = %user_id), err)]
    pub async fn grant_platform_scope(&self, user_id: UserId, scope_id: &str) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO platform_grants (user_id, scope_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id, scope_id) DO NOTHING
            "#,
        )
        .bind(Uuid::from(user_id))
        .bind(scope_id)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("directory.grant_platform_scope", e))?;
        Ok(())
    }
}

fn user_from_row(row: &sqlx::postgres::PgRow) -> Result<User, sqlx::Error> {
    Ok(User {
        id: UserId::from_uuid(row.try_get("id")?),
        external_id: row.try_get("external_id")?,
        email: row.try_get("email")?,
        display_name: row.try_get("display_name")?,
    })
}

#[async_trait]
impl Directory for PostgresDirectory {
    #[instrument(skip(self, identity), fields(external_id = %identity.uid), err)]
    async fn upsert_user(&self, identity: &VerifiedIdentity) -> Result<User, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO users (id, external_id, email, display_name)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (external_id) DO UPDATE
               SET email = EXCLUDED.email,
                   display_name = EXCLUDED.display_name,
                   updated_at = NOW()
            RETURNING id, external_id, email, display_name
            "#,
        )
        .bind(Uuid::from(UserId::new()))
        .bind(&identity.uid)
        .bind(&identity.email)
        .bind(&identity.name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("directory.upsert_user", e))?;

        user_from_row(&row).map_err(|e| map_sqlx_error("directory.upsert_user", e))
    }

    #[instrument(skip(self), fields(user_id = %id), err)]
    async fn get_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let row = sqlx::query("SELECT id, external_id, email, display_name FROM users WHERE id = $1")
            .bind(Uuid::from(id))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("directory.get_user", e))?;

        row.as_ref()
            .map(user_from_row)
            .transpose()
            .map_err(|e| map_sqlx_error("directory.get_user", e))
    }

    #[instrument(skip(self), fields(user_id = %user_id, org_id = ?org), err)]
    async fn list_memberships(
        &self,
        user_id: UserId,
        org: Option<&OrgId>,
    ) -> Result<Vec<MembershipRecord>, StoreError> {
        const OP: &str = "directory.list_memberships";
        let org = org.map(OrgId::as_str);

        let role_rows = sqlx::query(
            r#"
            SELECT org_id, role
            FROM memberships
            WHERE user_id = $1 AND ($2::TEXT IS NULL OR org_id = $2)
            ORDER BY ordinal ASC
            "#,
        )
        .bind(Uuid::from(user_id))
        .bind(org)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error(OP, e))?;

        let mut records: Vec<MembershipRecord> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        for row in &role_rows {
            let org_id: String = row.try_get("org_id").map_err(|e| map_sqlx_error(OP, e))?;
            let role: String = row.try_get("role").map_err(|e| map_sqlx_error(OP, e))?;

            let idx = *index.entry(org_id.clone()).or_insert_with(|| {
                records.push(MembershipRecord {
                    org_id: OrgId::from(org_id),
                    roles: Vec::new(),
                    team_ids: Vec::new(),
                });
                records.len() - 1
            });
            let role = Role::from(role);
            if !records[idx].roles.contains(&role) {
                records[idx].roles.push(role);
            }
        }

        if records.is_empty() {
            return Ok(records);
        }

        let team_rows = sqlx::query(
            r#"
            SELECT org_id, team_id
            FROM team_members
            WHERE user_id = $1 AND ($2::TEXT IS NULL OR org_id = $2)
            ORDER BY ordinal ASC
            "#,
        )
        .bind(Uuid::from(user_id))
        .bind(org)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error(OP, e))?;

        for row in &team_rows {
            let org_id: String = row.try_get("org_id").map_err(|e| map_sqlx_error(OP, e))?;
            let team_id: String = row.try_get("team_id").map_err(|e| map_sqlx_error(OP, e))?;
            // Team rows without a role in the same org grant no scope.
            if let Some(&idx) = index.get(&org_id) {
                records[idx].team_ids.push(TeamId::from(team_id));
            }
        }

        Ok(records)
    }

    #[instrument(skip(self), fields(user_id = %user_id, org_id = %org, role = %role), err)]
    async fn ensure_default_membership(
        &self,
        user_id: UserId,
        org: &OrgId,
        role: &Role,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO memberships (user_id, org_id, role)
            SELECT $1, $2, $3
            WHERE NOT EXISTS (
                SELECT 1 FROM memberships WHERE user_id = $1 AND org_id = $2
            )
            ON CONFLICT (user_id, org_id, role) DO NOTHING
            "#,
        )
        .bind(Uuid::from(user_id))
        .bind(org.as_str())
        .bind(role.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("directory.ensure_default_membership", e))?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), fields(user_id = %user_id), err)]
    async fn direct_grants(&self, user_id: UserId) -> Result<DirectGrants, StoreError> {
        const OP: &str = "directory.direct_grants";

        let permissions: Vec<String> =
            sqlx::query_scalar("SELECT permission FROM user_permissions WHERE user_id = $1 ORDER BY ordinal ASC")
                .bind(Uuid::from(user_id))
                .fetch_all(&self.pool)
                .await
                .map_err(|e| map_sqlx_error(OP, e))?;

        let platform_scopes: Vec<String> =
            sqlx::query_scalar("SELECT scope_id FROM platform_grants WHERE user_id = $1 ORDER BY ordinal ASC")
                .bind(Uuid::from(user_id))
                .fetch_all(&self.pool)
                .await
                .map_err(|e| map_sqlx_error(OP, e))?;

        Ok(DirectGrants {
            permissions: permissions.into_iter().map(Permission::from).collect(),
            platform_scopes,
        })
    }

    #[instrument(skip(self), err)]
    async fn list_known_permissions(&self) -> Result<BTreeSet<Permission>, StoreError> {
        let names: Vec<String> = sqlx::query_scalar("SELECT name FROM permissions")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("directory.list_known_permissions", e))?;

        Ok(names.into_iter().map(Permission::from).collect())
    }

    #[instrument(skip(self, grants), fields(role_count = grants.len()), err)]
    async fn mirror_role_grants(&self, grants: &RoleGrants) -> Result<(), StoreError> {
        const OP: &str = "directory.mirror_role_grants";

        let mut tx = self.pool.begin().await.map_err(|e| map_sqlx_error(OP, e))?;

        for (role, permissions) in grants {
            let names: Vec<String> = permissions.iter().map(|p| p.as_str().to_string()).collect();

            sqlx::query("INSERT INTO roles (name) VALUES ($1) ON CONFLICT (name) DO NOTHING")
                .bind(role.as_str())
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error(OP, e))?;

            sqlx::query("INSERT INTO permissions (name) SELECT UNNEST($1::TEXT[]) ON CONFLICT (name) DO NOTHING")
                .bind(&names)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error(OP, e))?;

            sqlx::query("DELETE FROM role_permissions WHERE role = $1 AND NOT (permission = ANY($2::TEXT[]))")
                .bind(role.as_str())
                .bind(&names)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error(OP, e))?;

            sqlx::query(
                r#"
                INSERT INTO role_permissions (role, permission)
                SELECT $1, UNNEST($2::TEXT[])
                ON CONFLICT (role, permission) DO NOTHING
                "#,
            )
            .bind(role.as_str())
            .bind(&names)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error(OP, e))?;
        }

        tx.commit().await.map_err(|e| map_sqlx_error(OP, e))
    }

    #[instrument(skip(self), err)]
    async fn list_mirrored_grants(&self) -> Result<RoleGrants, StoreError> {
        const OP: &str = "directory.list_mirrored_grants";

        let rows = sqlx::query(
            r#"
            SELECT r.name AS role, rp.permission AS permission
            FROM roles r
            LEFT JOIN role_permissions rp ON rp.role = r.name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error(OP, e))?;

        let mut grants = RoleGrants::new();
        for row in &rows {
            let role: String = row.try_get("role").map_err(|e| map_sqlx_error(OP, e))?;
            let permission: Option<String> = row.try_get("permission").map_err(|e| map_sqlx_error(OP, e))?;

            let entry = grants.entry(Role::from(role)).or_default();
            if let Some(permission) = permission {
                entry.insert(Permission::from(permission));
            }
        }
        Ok(grants)
    }
}
