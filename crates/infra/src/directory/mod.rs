//! User, membership and grant persistence.
//!
//! The directory is the only place authorization inputs are loaded from.
//! Which implementation backs it is decided once at startup; callers only
//! ever see `Arc<dyn Directory>`.
//!
//! ## Role mirror
//!
//! The durable `roles` / `permissions` / `role_permissions` tables mirror the
//! *explicit* grants of the static role configuration for external
//! inspection. They are never read when resolving a session: wildcard
//! semantics belong to the configuration alone.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;

use courtside_auth::{DirectGrants, MembershipRecord, Permission, Role, User, VerifiedIdentity};
use courtside_core::{OrgId, UserId};

use crate::error::StoreError;

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryDirectory;
pub use postgres::PostgresDirectory;

/// Explicit role → permission grants as mirrored into storage.
pub type RoleGrants = BTreeMap<Role, BTreeSet<Permission>>;

#[async_trait]
pub trait Directory: Send + Sync {
    /// Create the user on first sight, refresh email and name afterwards.
    async fn upsert_user(&self, identity: &VerifiedIdentity) -> Result<User, StoreError>;

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StoreError>;

    /// Memberships in discovery order, restricted to `org` when given.
    async fn list_memberships(
        &self,
        user_id: UserId,
        org: Option<&OrgId>,
    ) -> Result<Vec<MembershipRecord>, StoreError>;

    /// Give `user_id` `role` in `org` unless a membership there already exists.
    ///
    /// Returns `true` when a membership was created.
    async fn ensure_default_membership(
        &self,
        user_id: UserId,
        org: &OrgId,
        role: &Role,
    ) -> Result<bool, StoreError>;

    /// Identity-level permissions and platform scope grants.
    async fn direct_grants(&self, user_id: UserId) -> Result<DirectGrants, StoreError>;

    /// Permission catalogue as known to storage.
    async fn list_known_permissions(&self) -> Result<BTreeSet<Permission>, StoreError>;

    /// Replace the stored grants of every role in `grants` with exactly those grants.
    async fn mirror_role_grants(&self, grants: &RoleGrants) -> Result<(), StoreError>;

    async fn list_mirrored_grants(&self) -> Result<RoleGrants, StoreError>;
}
